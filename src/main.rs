fn main() {
    foxtrail::run();
}
