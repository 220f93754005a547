//! Param similarity for the Doom Loop detector: token Jaccard for
//! shell-like commands, Jaccard over flattened JSON leaves otherwise.

use serde_json::Value;
use std::collections::HashSet;

fn looks_like_shell_command(params: &Value) -> Option<&str> {
    params.get("command").and_then(Value::as_str)
}

fn tokenize(command: &str) -> HashSet<String> {
    command.split_whitespace().map(str::to_string).collect()
}

fn flatten_leaves(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                match v {
                    Value::Object(_) | Value::Array(_) => flatten_leaves(v, out),
                    _ => out.push(format!("{k}={v}")),
                }
            }
        }
        Value::Array(items) => {
            for (idx, v) in items.iter().enumerate() {
                match v {
                    Value::Object(_) | Value::Array(_) => flatten_leaves(v, out),
                    _ => out.push(format!("[{idx}]={v}")),
                }
            }
        }
        _ => out.push(value.to_string()),
    }
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// Similarity between two `tool.call` param payloads, in `[0, 1]`.
pub fn param_similarity(a: &Value, b: &Value) -> f64 {
    if let (Some(cmd_a), Some(cmd_b)) = (looks_like_shell_command(a), looks_like_shell_command(b))
    {
        return jaccard(&tokenize(cmd_a), &tokenize(cmd_b));
    }

    let mut leaves_a = Vec::new();
    let mut leaves_b = Vec::new();
    flatten_leaves(a, &mut leaves_a);
    flatten_leaves(b, &mut leaves_b);
    jaccard(
        &leaves_a.into_iter().collect(),
        &leaves_b.into_iter().collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn identical_commands_are_fully_similar() {
        let a = json!({"command": "ssh backup df -h"});
        let b = json!({"command": "ssh backup df -h"});
        assert_eq!(param_similarity(&a, &b), 1.0);
    }

    #[test]
    fn json_leaves_use_jaccard() {
        let a = json!({"path": "/tmp/a", "mode": "r"});
        let b = json!({"path": "/tmp/a", "mode": "w"});
        let sim = param_similarity(&a, &b);
        assert!(sim > 0.0 && sim < 1.0);
    }
}
