use std::process;

use uuid::Uuid;

use crate::{auth::generate_token, config::Config, environment::Environment};

pub fn handle_issue_token_command(config: &Config, environment: Environment, user_id: Uuid) {
    if !environment.allows_dev_tools() {
        eprintln!("❌ Refusing to issue tokens in production");
        process::exit(1);
    }

    match generate_token(config, user_id) {
        Ok(token) => println!("{token}"),
        Err(e) => {
            eprintln!("❌ Failed to sign token: {e}");
            process::exit(1);
        }
    }
}
