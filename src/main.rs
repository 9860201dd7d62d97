use vanos::core::system::print_performance_summary;
use vanos::{get_performance_summary, Engine, Simulator};
use vanos_engine_simulator as vanos;

fn main() {
    tracing_subscriber::fmt::init();

    // an engine file may be given as first argument, the BMW S54 is used otherwise
    let engine = match std::env::args().nth(1) {
        Some(file_name) => Engine::from_file(&file_name),
        None => Engine::bmw_s54(),
    };
    let engine = match engine {
        Ok(e) => e,
        Err(err) => {
            eprintln!("Error reading the engine:\n {}", err);
            std::process::exit(1)
        }
    };
    println!("{}\n", engine);

    let simulator = Simulator::new(engine);
    let (rpm, load) = (3000.0, 50.0);
    let results = match simulator.compare_vanos_settings(rpm, load, None) {
        Ok(r) => r,
        Err(err) => {
            eprintln!("Error at 'compare_vanos_settings':\n {}", err);
            std::process::exit(1)
        }
    };

    println!("{:.0} RPM, {:.0}% load\n", rpm, load);
    print_performance_summary(&get_performance_summary(&results));

    if let Some(stock) = results.first() {
        let file_name = "stock_final_cycle.txt";
        match stock.history.write_to_file(file_name, None) {
            Ok(()) => println!("\nfinal cycle of '{}' written to {}", stock.name, file_name),
            Err(err) => eprintln!("{}", err),
        }
    }
}
