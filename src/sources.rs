use crate::config::Config;

pub fn list_sources(config: &Config) {
    println!("{:<16} URL", "CATEGORY");
    for (category, url) in config.sources.urls() {
        println!("{:<16} {}", category.as_str(), url);
    }

    println!();
    match config.storage.backend.as_str() {
        "sqlite" => println!("storage: sqlite ({})", config.storage.path.display()),
        _ => println!("storage: json ({})", config.storage.dir.display()),
    }
    if config.telegram.is_enabled() {
        println!("notifier: telegram");
    } else {
        println!("notifier: log (telegram not configured)");
    }
    if config.schedule.enabled {
        println!("schedule: every {}h", config.schedule.interval_hours);
    } else {
        println!("schedule: disabled");
    }
}
