// Integration tests follow the organization suggested by Matklad:
// https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html

mod actor_lifecycle;
mod clock_drift;
mod platform_deadlines;
mod platform_network;
mod scheduling_policies;
