pub use error::LedgerError;
pub use money::Money;
pub use ops::{Engine, EngineBuilder, ExpenseField, ExpenseFilter, UserField};
pub use ops::expenses::ExpenseRow;
pub use ops::groups::GroupExpenseRow;
pub use ops::reports::{
    CategoryCount, MemberSpending, MonthlyCategorySpending, MonthlyTopSpender,
    PaymentMethodUsage, TagCount,
};
pub use ops::transfer::{ExportSort, ImportReport};
pub use session::{Role, Session};

pub mod categories;
pub mod expense_tags;
pub mod expenses;
pub mod group_expense_tags;
pub mod group_expenses;
pub mod group_memberships;
pub mod groups;
pub mod payment_methods;
pub mod split_shares;
pub mod tags;
pub mod users;

mod error;
mod money;
mod ops;
mod session;

type ResultLedger<T> = Result<T, LedgerError>;
