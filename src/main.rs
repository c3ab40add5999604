fn main() {
    std::process::exit(backrelay::app::startup::startup());
}
