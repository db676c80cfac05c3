use pipeline::adapters::homebrew::HomebrewAdapter;
use pipeline::run::adapter_main;

fn main() {
    adapter_main(HomebrewAdapter, "HOMEBREW_SOURCE");
}
