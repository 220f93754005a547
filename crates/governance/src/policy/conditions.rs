//! Evaluates a single [`Condition`] against an [`EvaluationContext`].

use chrono::{Timelike, Utc};
use globset::Glob;
use regex::Regex;
use trace_governance_common::error::{AppError, Result};
use trace_governance_models::evaluation::EvaluationContext;
use trace_governance_models::policy::{Condition, ContextField, TrustCondition};

pub fn evaluate(condition: &Condition, ctx: &EvaluationContext) -> Result<bool> {
    match condition {
        Condition::Tool(tool) => evaluate_tool(tool, ctx),
        Condition::Trust(trust) => Ok(evaluate_trust(trust, ctx)),
        Condition::Time(time) => evaluate_time(time, ctx),
        Condition::Frequency(_) => {
            // Frequency is stateful (a ring buffer keyed by agent/hook) and
            // is evaluated by the caller, which has access to that state;
            // by the time conditions are walked here it has already been
            // resolved into a synthetic true/false via `resolved_frequency`.
            Ok(true)
        }
        Condition::Context(context) => evaluate_context(context, ctx),
    }
}

fn evaluate_tool(
    tool: &trace_governance_models::policy::ToolCondition,
    ctx: &EvaluationContext,
) -> Result<bool> {
    let Some(tool_name) = &ctx.tool_name else {
        return Ok(false);
    };

    let name_matches = if tool.name.contains('*') || tool.name.contains('?') {
        Glob::new(&tool.name)
            .map_err(|e| AppError::PolicyFault(e.to_string()))?
            .compile_matcher()
            .is_match(tool_name)
    } else {
        tool.name == *tool_name
    };
    if !name_matches {
        return Ok(false);
    }

    if let (Some(key), Some(pattern)) = (&tool.param_key, &tool.param_regex) {
        let Some(params) = &ctx.tool_params else {
            return Ok(false);
        };
        let Some(value) = params.get(key) else {
            return Ok(false);
        };
        let text = value.as_str().map(str::to_string).unwrap_or(value.to_string());
        let regex = Regex::new(pattern).map_err(|e| AppError::PolicyFault(e.to_string()))?;
        return Ok(regex.is_match(&text));
    }

    Ok(true)
}

fn evaluate_trust(condition: &TrustCondition, ctx: &EvaluationContext) -> bool {
    match condition {
        TrustCondition::ScoreAtLeast(n) => ctx.trust.score >= *n as f64,
        TrustCondition::ScoreBelow(n) => ctx.trust.score < *n as f64,
        TrustCondition::Tier(tier) => ctx.trust.tier == *tier,
    }
}

fn evaluate_time(
    condition: &trace_governance_models::policy::TimeCondition,
    ctx: &EvaluationContext,
) -> Result<bool> {
    let tz: chrono_tz::Tz = condition
        .timezone
        .parse()
        .map_err(|_| AppError::PolicyFault(format!("unknown timezone `{}`", condition.timezone)))?;
    let local = ctx.timestamp.with_timezone(&tz);
    let minutes_now = local.hour() * 60 + local.minute();

    let parse_minutes = |s: &str| -> Result<u32> {
        let (h, m) = s
            .split_once(':')
            .ok_or_else(|| AppError::PolicyFault(format!("bad time window bound `{s}`")))?;
        let h: u32 = h.parse().map_err(|_| AppError::PolicyFault(format!("bad hour `{h}`")))?;
        let m: u32 = m.parse().map_err(|_| AppError::PolicyFault(format!("bad minute `{m}`")))?;
        Ok(h * 60 + m)
    };

    let start = parse_minutes(&condition.start)?;
    let end = parse_minutes(&condition.end)?;

    Ok(if start <= end {
        minutes_now >= start && minutes_now < end
    } else {
        // Window wraps midnight, e.g. "night 23:00-08:00".
        minutes_now >= start || minutes_now < end
    })
}

fn evaluate_context(
    condition: &trace_governance_models::policy::ContextCondition,
    ctx: &EvaluationContext,
) -> Result<bool> {
    let haystack = match condition.field {
        ContextField::Message => ctx.message.clone().unwrap_or_default(),
        ContextField::ToolParams => ctx
            .tool_params
            .as_ref()
            .map(|v| v.to_string())
            .unwrap_or_default(),
        ContextField::CrossAgent => ctx
            .cross_agent
            .as_ref()
            .map(|c| serde_json::to_string(c).unwrap_or_default())
            .unwrap_or_default(),
    };

    if let Some(needle) = &condition.contains {
        if haystack.contains(needle.as_str()) {
            return Ok(true);
        }
    }
    if let Some(pattern) = &condition.regex {
        let regex = Regex::new(pattern).map_err(|e| AppError::PolicyFault(e.to_string()))?;
        if regex.is_match(&haystack) {
            return Ok(true);
        }
    }
    Ok(condition.contains.is_none() && condition.regex.is_none())
}

/// Timestamp-in-range check extracted for the frequency ring buffer.
pub fn within_window(now: chrono::DateTime<Utc>, then: chrono::DateTime<Utc>, window_seconds: u64) -> bool {
    (now - then).num_seconds() <= window_seconds as i64
}
