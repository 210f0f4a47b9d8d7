use std::error::Error;
use std::sync::Arc;
use std::time::SystemTime;

use multimpl::*;

// Define regular traits and implementor structs

trait Logger {
    fn log(&self, content: String) -> Result<(), DispatchError>;
}

stand_in!(struct LoggerStandIn: Logger {
    fn log(&self, content: String) -> ();
});

struct ConsoleLogger;

struct AlertLogger {
    prefix: String,
}

impl AlertLogger {
    fn is_alert(&self, content: &str) -> bool {
        content.starts_with("alert")
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    // Declare the contract and its implementors

    let logger = ImplementeeDesc::interface("Logger").method("log", [STRING], UNIT);

    let console = ImplementorDesc::new("ConsoleLogger").method(
        "log",
        [STRING],
        UNIT,
        |_: &ConsoleLogger, args| {
            println!("{}", arg::<String>(args, 0)?);
            Ok(())
        },
    );

    let alert = ImplementorDesc::new("AlertLogger")
        .method("log", [STRING], UNIT, |a: &AlertLogger, args| {
            eprintln!("{} {}", a.prefix, arg::<String>(args, 0)?);
            Ok(())
        })
        .validity("is_alert", [STRING], |a: &AlertLogger, args| {
            Ok(a.is_alert(arg::<String>(args, 0)?))
        });

    let markers = Markers::from_toml_str(
        r#"
        [[marker]]
        implementor = "AlertLogger"
        method = "log"
        validity = "is_alert"
        priority = -1
        "#,
    )?;

    // Register the components and wire the stand-in

    let mut components = Components::new();
    components
        .instance("console", "ConsoleLogger", Arc::new(ConsoleLogger))?
        .instance(
            "alert",
            "AlertLogger",
            Arc::new(AlertLogger {
                prefix: String::from("[!]"),
            }),
        )?;

    let mut wiring =
        Wiring::new(Arc::new(components), Arc::new(TypeSystem::new())).with_markers(markers);
    wiring
        .implementor("Logger", console)
        .implementor("Logger", alert);

    let stand_in = wiring.stand_in(&logger)?;
    println!("{}", stand_in);

    let log = LoggerStandIn::new(stand_in.clone());
    let now = SystemTime::now().duration_since(SystemTime::UNIX_EPOCH)?;
    log.log(format!("{}s since epoch", now.as_secs()))?;
    log.log(String::from("alert: disk almost full"))?;

    Ok(())
}
