use clap::{Arg, ArgAction, Command};
use domain_risk::{DomainAnalyzer, RiskResult, Settings};
use log::LevelFilter;
use std::process;

const EXIT_CONFIG_ERROR: i32 = 1;
const EXIT_INVALID_DOMAIN: i32 = 2;

#[tokio::main]
async fn main() {
    let matches = Command::new("domain-risk")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Score a domain's risk from DNS, WHOIS, TLS and lexical signals")
        .arg(
            Arg::new("domain")
                .value_name("DOMAIN")
                .help("Domain or URL to analyze")
                .required_unless_present_any(["generate-config", "test-config"]),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Settings file (built-in defaults when omitted)"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Print the full result as JSON")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable debug logging")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .value_name("FILE")
                .help("Write the default settings to FILE and exit")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("test-config")
                .long("test-config")
                .help("Validate the settings file and exit")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let log_level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if let Some(generate_path) = matches.get_one::<String>("generate-config") {
        generate_default_config(generate_path);
        return;
    }

    let settings = match matches.get_one::<String>("config") {
        Some(path) => match Settings::load(path) {
            Ok(settings) => settings,
            Err(e) => {
                eprintln!("Error loading configuration '{path}': {e}");
                process::exit(EXIT_CONFIG_ERROR);
            }
        },
        None => Settings::default(),
    };

    if matches.get_flag("test-config") {
        print_settings_summary(&settings);
        return;
    }

    let analyzer = match DomainAnalyzer::new(settings) {
        Ok(analyzer) => analyzer,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            process::exit(EXIT_CONFIG_ERROR);
        }
    };

    let Some(domain) = matches.get_one::<String>("domain") else {
        eprintln!("No domain given");
        process::exit(EXIT_INVALID_DOMAIN);
    };

    let result = match analyzer.analyze(domain).await {
        Ok(result) => result,
        Err(e) => {
            eprintln!("{e}");
            process::exit(EXIT_INVALID_DOMAIN);
        }
    };

    if matches.get_flag("json") {
        match serde_json::to_string_pretty(&result) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                log::error!("Failed to serialize result: {e}");
                process::exit(1);
            }
        }
    } else {
        print_report(&result);
    }
}

fn generate_default_config(path: &str) {
    let rendered = match Settings::default().to_yaml() {
        Ok(yaml) => yaml,
        Err(e) => {
            eprintln!("Error rendering default configuration: {e}");
            process::exit(EXIT_CONFIG_ERROR);
        }
    };
    match std::fs::write(path, rendered) {
        Ok(()) => println!("Default configuration written to: {path}"),
        Err(e) => {
            eprintln!("Error writing configuration file: {e}");
            process::exit(EXIT_CONFIG_ERROR);
        }
    }
}

fn print_settings_summary(settings: &Settings) {
    println!("Configuration is valid");
    println!();
    println!("Rule weights:");
    for (rule, weight) in settings.risk_weights.entries() {
        println!("  {rule:<24} {weight:>4}");
    }
    let t = &settings.risk_thresholds;
    println!(
        "Thresholds: low={} medium={} high={} critical={}",
        t.low, t.medium, t.high, t.critical
    );
    println!("Risky TLDs: {}", settings.risky_tlds.join(" "));
    println!("Suspicious keywords: {}", settings.suspicious_keywords.join(" "));
    println!(
        "Timeouts: dns={}s whois={}s ssl={}s",
        settings.timeouts.dns, settings.timeouts.whois, settings.timeouts.ssl
    );
}

fn print_report(result: &RiskResult) {
    let signal = &result.signal_record;

    println!("Domain:         {}", result.domain);
    println!("Score:          {}/100", result.score);
    println!("Classification: {}", result.classification);
    println!();

    println!("Signals:");
    match signal.age_days {
        Some(days) => println!("  Age:          {days} days"),
        None => println!("  Age:          unknown"),
    }
    println!("  MX records:   {}", yes_no(signal.has_mx));
    println!("  SPF record:   {}", yes_no(signal.has_spf));
    println!("  Valid TLS:    {}", yes_no(signal.ssl_valid));
    println!("  Self-signed:  {}", yes_no(signal.is_self_signed));
    println!("  Risky TLD:    {}", yes_no(signal.risky_tld));
    println!("  Punycode:     {}", yes_no(signal.is_punycode));
    if !signal.triggered_keywords.is_empty() {
        println!("  Keywords:     {}", signal.triggered_keywords.join(", "));
    }

    if !result.triggered_rules.is_empty() {
        println!();
        println!("Triggered rules:");
        for rule in &result.triggered_rules {
            println!("  +{:<3} {}: {}", rule.weight, rule.rule_name, rule.justification);
        }
    }

    if !signal.errors.is_empty() {
        println!();
        println!("Collection errors:");
        for error in &signal.errors {
            println!("  {error}");
        }
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}
