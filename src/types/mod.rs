pub(crate) mod action;
pub(crate) mod command;
pub(crate) mod domain;
pub(crate) mod operation;
pub(crate) mod port;
pub(crate) mod service;
pub(crate) mod state;
