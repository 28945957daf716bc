//! Argument vectors for `brew services` subcommands.

use crate::ServiceAction;

pub(crate) fn list(debug: bool) -> Vec<String> {
    finish(vec!["services".into(), "list".into(), "--json".into()], debug)
}

pub(crate) fn info(name: &str, debug: bool) -> Vec<String> {
    finish(
        vec!["services".into(), "info".into(), name.into(), "--json".into()],
        debug,
    )
}

pub(crate) fn cleanup(debug: bool) -> Vec<String> {
    finish(vec!["services".into(), "cleanup".into()], debug)
}

pub(crate) fn action(action: &ServiceAction, name: &str, debug: bool) -> Vec<String> {
    let mut args = vec!["services".into(), action.subcommand().into(), name.into()];
    args.extend(action.additional_arguments());
    finish(args, debug)
}

pub(crate) fn action_all(action: &ServiceAction, debug: bool) -> Vec<String> {
    let mut args = vec!["services".into(), action.subcommand().into(), "--all".into()];
    args.extend(action.additional_arguments());
    finish(args, debug)
}

fn finish(mut args: Vec<String>, debug: bool) -> Vec<String> {
    if debug {
        args.push("--debug".into());
    }
    args
}
