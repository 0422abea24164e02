pub mod assignment_resolver;
