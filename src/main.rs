use clap::Parser;

use cddc::driver::{Cli, Driver};

fn main() {
    // Deeply nested C sources recurse through the descent parser and the
    // IR lowering; run the compiler on a thread with a large stack.
    const STACK_SIZE: usize = 64 * 1024 * 1024; // 64 MB
    let builder = std::thread::Builder::new().stack_size(STACK_SIZE);
    let handle = builder.spawn(real_main).expect("failed to spawn main thread");
    match handle.join() {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            eprintln!("cddc: error: {:#}", e);
            std::process::exit(1);
        }
        Err(e) => {
            if let Some(s) = e.downcast_ref::<&str>() {
                eprintln!("cddc: internal error: {}", s);
            } else if let Some(s) = e.downcast_ref::<String>() {
                eprintln!("cddc: internal error: {}", s);
            } else {
                eprintln!("cddc: internal error (thread panicked)");
            }
            std::process::exit(1);
        }
    }
}

fn real_main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let mut driver = Driver::new(cli);
    driver.run()
}
