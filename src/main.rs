fn main() {
    feedback_collector_lib::run()
}
