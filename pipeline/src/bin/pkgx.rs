use pipeline::adapters::pkgx::PkgxAdapter;
use pipeline::run::adapter_main;

fn main() {
    adapter_main(PkgxAdapter, "PKGX_SOURCE");
}
