use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;
	let args = banter_gateway::Args::parse();
	banter_gateway::run(args).await
}
