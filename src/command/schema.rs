//! `ot schema`: emit the JSON Schema of the config file format (§6).

use schemars::schema_for;

use crate::config::Config;

pub fn run() {
    let schema = schema_for!(Config);
    match serde_json::to_string_pretty(&schema) {
        Ok(text) => println!("{text}"),
        Err(e) => eprintln!("error: failed to render schema: {e}"),
    }
}
