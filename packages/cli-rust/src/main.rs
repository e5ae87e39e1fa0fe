//! eps-deploy CLI binary entry point

use console::style;

fn main() {
    let code = match eps_deploy::run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {e:#}", style("Error:").red().bold());
            1
        }
    };
    std::process::exit(code);
}
