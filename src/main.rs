use std::path::PathBuf;

use anyhow::Result;
use quiz_grader::utils::logging;
use quiz_grader::{App, Command, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config_file = std::env::var("QUIZ_GRADER_CONFIG").ok().map(PathBuf::from);
    let config = Config::load(config_file.as_deref())?;

    // 初始化日志
    logging::init(config.verbose_logging);

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match Command::parse(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(2);
        }
    };

    // 初始化并运行应用
    App::initialize(config).await?.run(command).await?;

    Ok(())
}
