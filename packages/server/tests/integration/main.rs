
mod workflow;
