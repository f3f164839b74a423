use gatewatch_core::{Config, EventKind, Paths};

pub async fn run() -> anyhow::Result<()> {
    let paths = Paths::new();

    println!("gatewatch status");
    println!("================");
    println!();

    let config_path = paths.config_file();
    let config_exists = config_path.exists();
    println!(
        "Config:    {} {}",
        config_path.display(),
        if config_exists { "✓" } else { "✗ (defaults)" }
    );

    let seed_path = paths.activities_seed_file();
    println!(
        "Seed:      {} {}",
        seed_path.display(),
        if seed_path.exists() { "✓" } else { "✗ (none)" }
    );
    println!();

    let config = Config::load_or_default(&paths)?;

    println!("Bridge:");
    println!("  history capacity:  {}", config.bridge.history_capacity);
    println!("  max emit depth:    {}", config.bridge.max_emit_depth);
    println!();
    println!("Stream:");
    println!("  endpoint:          {}", config.stream.endpoint);
    println!("  reconnect delay:   {}ms", config.stream.reconnect_delay_ms);
    println!("  buffer capacity:   {}", config.stream.buffer_capacity);
    println!();
    println!("Actions:");
    println!("  result ttl:        {}s", config.actions.result_ttl_secs);
    println!();

    let kinds: Vec<&str> = EventKind::ALL.iter().map(|k| k.as_str()).collect();
    println!("Event kinds: {}", kinds.join(", "));

    if !config_exists {
        println!();
        println!("Run `gatewatch config init` to write a config file.");
    }

    Ok(())
}
