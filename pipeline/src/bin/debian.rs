use pipeline::adapters::debian::DebianAdapter;
use pipeline::run::adapter_main;

fn main() {
    adapter_main(DebianAdapter, "DEBIAN_SOURCE");
}
