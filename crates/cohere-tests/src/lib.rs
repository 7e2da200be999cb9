#[cfg(test)]
mod helpers;

#[cfg(test)]
mod e2e_tests;
#[cfg(test)]
mod error_tests;
#[cfg(test)]
mod manager_grpc_tests;
