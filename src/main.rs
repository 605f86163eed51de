// Prevents additional console window on Windows in release, DO NOT REMOVE!!
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

fn main() {
    // RUST_LOG controls verbosity, e.g. RUST_LOG=kokoro_speak_lib=debug
    env_logger::init();

    kokoro_speak_lib::run()
}
