pub mod get;
pub mod route;
pub mod set;

use std::io::Write;
use std::sync::Arc;

use illdb_core::{BrowserCommand, BrowserConfig};
use illdb_shard::{CommandOutput, Session};
use illdb_sql::{ConnectionRegistry, MySqlConnector};

/// Open a session against the configured MySQL management server and run
/// one command, writing its output to stdout.
pub fn execute(config: &BrowserConfig, command: &BrowserCommand) -> anyhow::Result<()> {
    let connector = MySqlConnector::new()?;
    let registry = ConnectionRegistry::new(Arc::new(connector)).with_show_sql(config.show_sql);
    let session = Session::open(config, &registry)?;
    run(&session, command, &mut std::io::stdout().lock())
}

pub fn run(session: &Session<'_>, command: &BrowserCommand, out: &mut impl Write) -> anyhow::Result<()> {
    match session.dispatch(command)? {
        CommandOutput::Document(payload) => get::print(&payload, out),
        CommandOutput::Updated(outcome) => {
            set::report(command.docid(), &outcome);
            Ok(())
        }
        CommandOutput::Route(location) => route::print(&location, out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use illdb_core::InactiveReadPolicy;
    use illdb_sql::{MemoryConnector, Row, SqlValue};
    use std::time::Duration;

    fn deployment() -> MemoryConnector {
        let connector = MemoryConnector::new();
        connector.insert_row(
            "janus",
            "configs",
            Row::new().with("name", "db_prefix").with("value", "janus"),
        );
        connector.insert_row(
            "janus",
            "nodes",
            Row::new()
                .with("id", 1i64)
                .with("host", "db1")
                .with("port", 3306i64)
                .with("username", "shard")
                .with("pwd", "pw")
                .with("status", "active")
                .with("weight", 1i64),
        );
        connector.insert_row(
            "janus",
            "namespaces",
            Row::new()
                .with("name", "global")
                .with("numshards", 4i64)
                .with("created", SqlValue::Null),
        );
        connector.insert_row(
            "janus",
            "shards",
            Row::new()
                .with("id", 1i64)
                .with("namespace", "global")
                .with("node", 1i64)
                .with("status", "active"),
        );
        connector.insert_row(
            "janus_global_1_data",
            "data_account",
            Row::new()
                .with("_id", 1i64)
                .with("docid", "*:account:abc123")
                .with("document", "{\"_meta\":{\"size\":21}}")
                .with("created", SqlValue::Null)
                .with("modified", SqlValue::Null)
                .with("cas", 1i64)
                .with("expired", SqlValue::Null)
                .with("meta", "{\"compression\":false}"),
        );
        connector
    }

    fn config() -> BrowserConfig {
        BrowserConfig {
            host: "mgmt".to_string(),
            port: 3306,
            username: None,
            password: None,
            bucket: "janus".to_string(),
            connect_timeout: Duration::from_secs(1),
            show_sql: true,
            inactive_reads: InactiveReadPolicy::Refuse,
        }
    }

    fn run_command(connector: &MemoryConnector, command: BrowserCommand) -> anyhow::Result<Vec<u8>> {
        let registry = ConnectionRegistry::new(Arc::new(connector.clone())).with_show_sql(true);
        let config = config();
        let session = Session::open(&config, &registry)?;
        let mut out = Vec::new();
        run(&session, &command, &mut out)?;
        Ok(out)
    }

    #[test]
    fn get_prints_payload_and_newline() {
        let out = run_command(
            &deployment(),
            BrowserCommand::Get {
                docid: "*:account:abc123".to_string(),
            },
        )
        .unwrap();
        assert_eq!(out, b"{\"_meta\":{\"size\":21}}\n".to_vec());
    }

    #[test]
    fn set_prints_nothing() {
        let connector = deployment();
        let out = run_command(
            &connector,
            BrowserCommand::Set {
                docid: "*:account:abc123".to_string(),
                document: "{\"_meta\":{},\"n\":1}".to_string(),
            },
        )
        .unwrap();
        assert!(out.is_empty());
        assert_eq!(connector.commits(), 1);
        assert_eq!(
            connector.rows("janus_global_1_data", "data_account")[0].get("document"),
            Some(&SqlValue::from("{\"_meta\":{\"size\":27},\"n\":1}"))
        );
    }

    #[test]
    fn route_prints_location_json() {
        let out = run_command(
            &deployment(),
            BrowserCommand::Route {
                docid: "*:account:abc123".to_string(),
            },
        )
        .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(json["shard"], 1);
        assert_eq!(json["database"], "janus_global_1_data");
        assert_eq!(json["node"]["host"], "db1");
    }

    #[test]
    fn failures_surface_as_errors() {
        let err = run_command(
            &deployment(),
            BrowserCommand::Get {
                docid: "*:account:nope".to_string(),
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("*:account:nope"));
    }
}
