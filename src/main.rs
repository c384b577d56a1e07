fn main() {
    pricecast::cli::run();
}
