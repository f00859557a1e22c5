use serde::Serialize;

use crate::exit::{CliResult, SUCCESS};
use crate::output::OutputFormat;

#[derive(Serialize)]
struct VersionOutput<'a> {
    name: &'a str,
    version: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    features: Option<Vec<&'a str>>,
}

fn features() -> Vec<&'static str> {
    let mut features = vec!["cli"];
    if cfg!(feature = "async") {
        features.push("async");
    }
    features
}

pub fn run(args: super::VersionArgs, format: OutputFormat) -> CliResult<i32> {
    let target = option_env!("RTLS_BUILD_TARGET").unwrap_or("unknown");
    let out = VersionOutput {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        target: args.extended.then_some(target),
        features: args.extended.then(features),
    };

    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        _ => {
            println!("{} {}", out.name, out.version);
            if args.extended {
                println!("target: {target}");
                println!("features: {}", features().join(", "));
            }
        }
    }
    Ok(SUCCESS)
}
