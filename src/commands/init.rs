use anyhow::Result;

use crate::config::DEFAULT_CONFIG_FILE;

pub fn run() -> Result<()> {
    let cwd = std::env::current_dir()?;
    let config_path = cwd.join(DEFAULT_CONFIG_FILE);

    if config_path.exists() {
        anyhow::bail!("{} already exists in {}", DEFAULT_CONFIG_FILE, cwd.display());
    }

    let config = r#"# studiod configuration. Services start in declaration order and are torn
# down in reverse order.

[supervisor]
# lock_file = "studiod.lock"
# kill_file = "studiod.kill"   # create this file to force-stop everything
# log_file = "studiod.log"
# lock_stale_secs = 300
# grace_secs = 5
# health_interval_secs = 10

# -- Inference engine (optional: the stack runs without it) --
[[service]]
name = "engine"
command = "python -m llama_cpp.server --model ./models/coder.gguf --port 8000"
port = 8000
optional = true
startup_timeout_secs = 90
ready_check = { type = "http", url = "http://127.0.0.1:8000/health" }

# -- App backend (mandatory) --
[[service]]
name = "backend"
command = "node server.js"
path = "backend"
port = 5050
startup_timeout_secs = 60
ready_check = { type = "tcp" }

# [service.env]
# NODE_ENV = "production"
"#;

    std::fs::write(&config_path, config)?;
    println!("Created {} in {}", DEFAULT_CONFIG_FILE, cwd.display());
    println!();
    println!("Edit the file, then run `studiod start` to begin.");
    Ok(())
}
