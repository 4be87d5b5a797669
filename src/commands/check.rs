use colored::Colorize;
use event_collector::config::Config;

/// Execute the check command
///
/// Configuration was already resolved and validated by the time this runs;
/// this prints what the collector would start with.
pub fn execute(cfg: &Config) {
    println!("{}", "✓ Configuration test successful".green());
    println!();

    println!("{}", "Configuration Summary:".bold());
    println!("  {}: {}:{}", "Server".cyan(), cfg.host, cfg.port);
    println!("  {}: {}", "Database".cyan(), cfg.db_path);
    println!("  {}: {}", "Log Level".cyan(), cfg.log_level);
    println!("  {}: {}", "Log Format".cyan(), cfg.log_format);
    println!();

    println!("{}", "Queue:".cyan());
    println!("    Capacity: {} (drop-oldest)", cfg.max_queue_size);
    println!(
        "    Flush: every {}ms, batches of {}, early at {} queued",
        cfg.flush_interval_ms, cfg.flush_batch_size, cfg.flush_queue_threshold
    );
    println!("    Shutdown timeout: {}ms", cfg.shutdown_timeout_ms);
    println!();

    println!("{}", "Retention:".cyan());
    println!("    Max age: {}h", cfg.retention_hours);
    println!("    Max rows: {}", cfg.max_rows);
    println!("    Sweep interval: {}ms", cfg.retention_interval_ms);
    println!();

    let keys = cfg.redact_keys.to_vec();
    if keys.is_empty() {
        println!("  {}: {}", "Redacted keys".cyan(), "none".dimmed());
    } else {
        println!("  {}: {}", "Redacted keys".cyan(), keys.join(", "));
    }
}
