use super::{Directive, DirectiveOutput};
use crate::session::Session;

pub(super) static DIRECTIVES: &[Directive] = &[
    Directive {
        name: "checkpoint",
        aliases: &["ckp"],
        usage: "//checkpoint [name]",
        summary: "Save the conversation of every model",
        handler: checkpoint,
    },
    Directive {
        name: "restore",
        aliases: &[],
        usage: "//restore [name]",
        summary: "Go back to a checkpoint (default: the previous one)",
        handler: restore,
    },
    Directive {
        name: "clear",
        aliases: &[],
        usage: "//clear [keep|all]",
        summary: "Start over; `all` also drops the system prompt",
        handler: clear,
    },
    Directive {
        name: "review",
        aliases: &["context"],
        usage: "//review",
        summary: "Show the history with checkpoint markers",
        handler: review,
    },
    Directive {
        name: "checkpoints",
        aliases: &[],
        usage: "//checkpoints",
        summary: "List checkpoints",
        handler: list_checkpoints,
    },
    Directive {
        name: "model",
        aliases: &[],
        usage: "//model [name[=role],...]",
        summary: "Show or replace the active models",
        handler: model,
    },
    Directive {
        name: "consensus",
        aliases: &[],
        usage: "//consensus [on|off]",
        summary: "Show or toggle consensus synthesis",
        handler: consensus,
    },
    Directive {
        name: "tools",
        aliases: &[],
        usage: "//tools [reload]",
        summary: "List loaded tools and MCP servers, or reconnect them",
        handler: tools,
    },
    Directive {
        name: "help",
        aliases: &[],
        usage: "//help",
        summary: "Show this list",
        handler: help,
    },
];

fn optional(args: &str) -> Option<&str> {
    if args.is_empty() {
        None
    } else {
        Some(args)
    }
}

fn checkpoint(args: &str, session: &mut Session) -> DirectiveOutput {
    session.checkpoint(optional(args)).into()
}

fn restore(args: &str, session: &mut Session) -> DirectiveOutput {
    session.restore(optional(args)).into()
}

fn clear(args: &str, session: &mut Session) -> DirectiveOutput {
    match args.to_ascii_lowercase().as_str() {
        "" | "keep" => session.clear(true),
        "all" => session.clear(false),
        other => format!("Unknown option '{other}'. Usage: //clear [keep|all]"),
    }
    .into()
}

fn review(_args: &str, session: &mut Session) -> DirectiveOutput {
    session.review().into()
}

fn list_checkpoints(_args: &str, session: &mut Session) -> DirectiveOutput {
    session.list_checkpoints().into()
}

fn model(args: &str, session: &mut Session) -> DirectiveOutput {
    if args.is_empty() {
        return session.describe_models().into();
    }
    session.replace_models(args).unwrap_or_else(|e| e.to_string()).into()
}

fn consensus(args: &str, session: &mut Session) -> DirectiveOutput {
    let on = match args.to_ascii_lowercase().as_str() {
        "" => {
            let state = if session.dispatcher().consensus() { "on" } else { "off" };
            return format!("Consensus is {state}").into();
        }
        "on" | "true" | "1" => true,
        "off" | "false" | "0" => false,
        other => return format!("Unknown option '{other}'. Usage: //consensus [on|off]").into(),
    };
    session.set_consensus(on);
    format!("Consensus {}", if on { "enabled" } else { "disabled" }).into()
}

fn tools(args: &str, session: &mut Session) -> DirectiveOutput {
    match args.to_ascii_lowercase().as_str() {
        "" => session.tools().describe().into(),
        "reload" => DirectiveOutput::ReloadTools,
        other => format!("Unknown option '{other}'. Usage: //tools [reload]").into(),
    }
}

fn help(_args: &str, session: &mut Session) -> DirectiveOutput {
    session.directives().help().into()
}
