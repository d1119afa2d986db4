use crate::spec_file;
use serde_json::{json, Value};
use std::path::Path;
use taleweave_config::OrchestratorConfig;
use taleweave_task::{RequestPlanner, TaskGraph};

pub fn plan(spec: &Path, config: &OrchestratorConfig) -> eyre::Result<()> {
    let graph = load_graph(spec, config)?;
    println!("{}", serde_json::to_string_pretty(&plan_json(&graph))?);
    Ok(())
}

pub fn fingerprints(spec: &Path, config: &OrchestratorConfig) -> eyre::Result<()> {
    let graph = load_graph(spec, config)?;
    println!("{}", serde_json::to_string_pretty(&fingerprint_json(&graph))?);
    Ok(())
}

fn load_graph(spec: &Path, config: &OrchestratorConfig) -> eyre::Result<TaskGraph> {
    let spec = spec_file::load(spec)?;
    Ok(RequestPlanner::new(config.max_pages).plan(&spec)?)
}

/// Tasks in dependency order with their edges
fn plan_json(graph: &TaskGraph) -> Value {
    let tasks: Vec<Value> = graph
        .topological_order()
        .into_iter()
        .map(|task| {
            json!({
                "id": task.id,
                "kind": task.kind,
                "page": task.page,
                "dependsOn": graph.dependencies(&task.id),
                "fingerprint": task.fingerprint,
            })
        })
        .collect();
    json!({ "tasks": tasks })
}

fn fingerprint_json(graph: &TaskGraph) -> Value {
    graph
        .topological_order()
        .into_iter()
        .map(|task| (task.id.to_string(), json!(task.fingerprint)))
        .collect::<serde_json::Map<String, Value>>()
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use taleweave_core::StorySpec;

    fn graph() -> TaskGraph {
        RequestPlanner::default()
            .plan(&StorySpec::new("Snow Fort", 2))
            .unwrap()
    }

    #[test]
    fn test_plan_lists_dependencies_first() {
        let value = plan_json(&graph());
        let tasks = value["tasks"].as_array().unwrap();
        assert_eq!(tasks.len(), 6);
        assert_eq!(tasks[0]["id"], "outline");
        assert_eq!(tasks[0]["dependsOn"], json!([]));

        let image = tasks.iter().find(|t| t["id"] == "page-2-image").unwrap();
        assert_eq!(image["kind"], "pageImage");
        assert_eq!(image["page"], 2);
        assert_eq!(image["dependsOn"], json!(["page-2-text"]));
    }

    #[test]
    fn test_fingerprints_are_keyed_by_task() {
        let graph = graph();
        let value = fingerprint_json(&graph);
        let map = value.as_object().unwrap();
        assert_eq!(map.len(), 6);
        for task in graph.tasks() {
            assert_eq!(map[task.id.as_str()], task.fingerprint.as_str());
        }
    }
}
