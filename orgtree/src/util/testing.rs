use std::env;
use std::sync::Once;
use tracing::{debug, info};
use tracing_subscriber::{
    filter::filter_fn,
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter,
};

use crate::domain::{NodeType, TreeNode};

static TEST_SETUP: Once = Once::new();

pub fn init_test_setup() {
    TEST_SETUP.call_once(|| {
        if env::var("RUST_LOG").is_err() {
            env::set_var("RUST_LOG", "debug");
        }
        // global logging subscriber, used by all tracing log macros
        setup_test_logging();
        info!("Test Setup complete");
    });
}

fn setup_test_logging() {
    debug!("INIT: Attempting logger init from testing.rs");

    let noisy_modules = ["hyper", "reqwest", "h2"];
    let module_filter = filter_fn(move |metadata| {
        !noisy_modules
            .iter()
            .any(|name| metadata.target().starts_with(name))
    });

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

    let subscriber = tracing_subscriber::registry().with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_names(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_filter(module_filter)
            .with_filter(env_filter),
    );

    // Only set if we haven't already set a global subscriber
    if tracing::dispatcher::has_been_set() {
        debug!("Tracing subscriber already set");
    } else {
        subscriber.try_init().unwrap_or_else(|e| {
            eprintln!("Error: Failed to set up logging: {}", e);
        });
    }
}

/// Small consistent tree: one institute with a school, a department and a teacher.
pub fn sample_nodes() -> Vec<TreeNode> {
    vec![
        TreeNode::new(1, "North Institute", "Main campus", NodeType::Institute, None),
        TreeNode::new(2, "School of Science", "Natural sciences", NodeType::School, Some(1)),
        TreeNode::new(3, "Physics", "Physics department", NodeType::Department, Some(2)),
        TreeNode::new(4, "Ada Lovelace", "Teaches mechanics", NodeType::Teacher, Some(3)),
    ]
}

/// `sample_nodes` plus an orphan (#5, unknown parent) and a two-node cycle (#6, #7).
pub fn broken_nodes() -> Vec<TreeNode> {
    let mut nodes = sample_nodes();
    nodes.push(TreeNode::new(5, "Lost", "Parent was deleted", NodeType::Teacher, Some(99)));
    nodes.push(TreeNode::new(6, "Loop A", "Points at loop B", NodeType::School, Some(7)));
    nodes.push(TreeNode::new(7, "Loop B", "Points at loop A", NodeType::School, Some(6)));
    nodes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_test_setup() {
        init_test_setup();
    }

    #[test]
    fn given_sample_fixtures_when_analyzing_then_only_broken_set_is_inconsistent() {
        assert!(crate::domain::analyze(&sample_nodes()).is_consistent());
        assert!(!crate::domain::analyze(&broken_nodes()).is_consistent());
    }
}
