fn main() {
    if let Err(err) = acs_tracts::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
