//! Check command implementation.
//!
//! Validates configuration and proc filesystem access.

use process_stats_exporter::process::collect_pids;
use process_stats_exporter::ProcessResolver;

use crate::config::{validate_effective_config, Config};

/// Validates configuration and reports which processes are currently selected.
pub fn command_check(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Process Stats Exporter - System Check");
    println!("========================================");

    let mut all_ok = true;
    let proc_root = config.proc_root();

    // Check proc filesystem
    println!("\n📁 Checking {} ...", proc_root.display());
    let pids = collect_pids(&proc_root);
    if pids.is_empty() {
        println!("   ❌ Cannot read any process entries from {}", proc_root.display());
        all_ok = false;
    } else {
        println!("   ✅ Can read {} process entries", pids.len());
    }

    // Check configuration
    println!("\n⚙️  Checking configuration...");
    match validate_effective_config(config) {
        Ok(_) => println!("   ✅ Configuration is valid"),
        Err(e) => {
            println!("   ❌ Configuration invalid: {}", e);
            all_ok = false;
        }
    }

    // Check selection
    if all_ok {
        println!("\n🎯 Checking process selection...");
        let resolver = ProcessResolver::new(config.selection()?, proc_root);
        let mut selected = 0;
        for (labeler, mut process) in resolver.resolve() {
            selected += 1;
            let pattern = labeler
                .regexp()
                .map(|re| format!(" (matched '{}')", re.as_str()))
                .unwrap_or_default();
            match process.collect_stats() {
                Ok(()) => println!(
                    "   ✅ PID {} {}{}",
                    process.pid,
                    process.comm().unwrap_or_default(),
                    pattern
                ),
                Err(e) => println!("   ⚠️  PID {}{}: {}", process.pid, pattern, e),
            }
        }
        if selected == 0 {
            println!("   ⚠️  No processes currently selected");
        }
    }

    println!("\n📋 Summary:");
    if all_ok {
        println!("   ✅ All checks passed - system is ready");
        Ok(())
    } else {
        println!("   ❌ Some checks failed - please review warnings");
        std::process::exit(1);
    }
}
