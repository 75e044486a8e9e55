mod reachable;
mod serialization;
