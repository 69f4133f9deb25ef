pub mod check;
pub mod cli;
pub mod decl;
pub mod ty;
pub mod value;

fn main() -> anyhow::Result<()> {
    let command_line_interface = cli::CommandLineInterface::load();
    // eprintln!("{command_line_interface:#?}");
    command_line_interface.run()
}
