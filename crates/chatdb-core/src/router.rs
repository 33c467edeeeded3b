//! Dispatch from query shape to execution strategy.

use crate::models::{Document, StructuredQuery};

/// How a [`StructuredQuery`] is executed. Borrows from the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExecutionStrategy<'q> {
    /// Run statements one by one against the relational store.
    Relational { statements: &'q [String] },
    /// `DocumentExecutor::find`.
    Find {
        container: &'q str,
        filter: &'q Document,
    },
    /// `DocumentExecutor::aggregate`.
    Aggregate {
        container: &'q str,
        stages: &'q [Document],
    },
    /// `DocumentExecutor::update`.
    Update {
        container: &'q str,
        filter: &'q Document,
        update: &'q Document,
    },
}

pub fn route(query: &StructuredQuery) -> ExecutionStrategy<'_> {
    match query {
        StructuredQuery::RelationalStatements { statements } => {
            ExecutionStrategy::Relational { statements }
        }
        StructuredQuery::DocumentFilter { container, filter } => {
            ExecutionStrategy::Find { container, filter }
        }
        StructuredQuery::DocumentPipeline { container, stages } => {
            ExecutionStrategy::Aggregate { container, stages }
        }
        StructuredQuery::DocumentUpdate {
            container,
            filter,
            update,
        } => ExecutionStrategy::Update {
            container,
            filter,
            update,
        },
    }
}
