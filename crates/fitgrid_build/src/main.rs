mod cli;
mod config;

fn main() -> miette::Result<()> {
    cli::main()
}
