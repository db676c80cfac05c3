use pipeline::adapters::crates::CratesAdapter;
use pipeline::run::adapter_main;

fn main() {
    adapter_main(CratesAdapter, "CRATES_SOURCE");
}
