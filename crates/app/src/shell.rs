//! Line-oriented command shell over the engine. One command per line,
//! quoted tokens respected, verbs case-insensitive. The active session
//! lives here as a plain local; nothing engine-side is process-global.

use std::fmt;
use std::path::Path;

use chrono::NaiveDate;
use engine::{
    Engine, ExpenseField, ExpenseFilter, ExpenseRow, ExportSort, GroupExpenseRow, LedgerError,
    Money, Role, Session, UserField,
};
use rustyline::{DefaultEditor, error::ReadlineError};

pub async fn run(engine: Engine) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut editor = DefaultEditor::new()?;
    let mut shell = Shell {
        engine,
        session: None,
    };

    println!("spendbook - type 'help' for commands, 'exit' to quit");
    loop {
        let prompt = match &shell.session {
            Some(session) => format!("{}> ", session.username),
            None => "> ".to_string(),
        };
        match editor.readline(&prompt) {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                editor.add_history_entry(trimmed).ok();

                let tokens = match shell_words::split(trimmed) {
                    Ok(tokens) => tokens,
                    Err(err) => {
                        println!("error: {err}");
                        continue;
                    }
                };
                if tokens.is_empty() {
                    continue;
                }
                let verb = tokens[0].to_lowercase();
                let args: Vec<&str> = tokens.iter().skip(1).map(String::as_str).collect();

                if verb == "exit" {
                    break;
                }
                if let Err(err) = shell.dispatch(&verb, &args).await {
                    println!("error: {err}");
                }
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

enum ShellError {
    Usage(String),
    Ledger(LedgerError),
}

impl fmt::Display for ShellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Usage(msg) => f.write_str(msg),
            Self::Ledger(err) => write!(f, "{err}"),
        }
    }
}

impl From<LedgerError> for ShellError {
    fn from(err: LedgerError) -> Self {
        Self::Ledger(err)
    }
}

fn usage(msg: impl Into<String>) -> ShellError {
    ShellError::Usage(msg.into())
}

/// Splits a comma-joined argument; `-` stands for the empty list so a
/// trailing optional argument can be skipped positionally.
fn split_csv(raw: &str) -> Vec<String> {
    if raw == "-" {
        return Vec::new();
    }
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_ymd(raw: &str) -> Result<NaiveDate, ShellError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| usage(format!("invalid date: {raw} (expected YYYY-MM-DD)")))
}

fn parse_filters(args: &[&str]) -> Result<Vec<ExpenseFilter>, ShellError> {
    args.iter()
        .map(|arg| {
            let stripped = arg
                .strip_prefix("--")
                .ok_or_else(|| usage(format!("filters look like --key=value, got {arg}")))?;
            let (key, value) = stripped
                .split_once('=')
                .ok_or_else(|| usage(format!("filters look like --key=value, got {arg}")))?;
            ExpenseFilter::parse(key, value).map_err(ShellError::from)
        })
        .collect()
}

fn parse_sort(args: &[&str]) -> Result<ExportSort, ShellError> {
    let [keyword, field] = args else {
        return Err(usage("expected: sort-on <field>"));
    };
    if !keyword.eq_ignore_ascii_case("sort-on") {
        return Err(usage(format!("expected 'sort-on', got {keyword}")));
    }
    Ok(ExportSort::try_from(*field)?)
}

fn print_expense(row: &ExpenseRow) {
    println!(
        "#{} {} {} {} {} {} [{}]",
        row.id,
        row.date,
        row.amount,
        row.category,
        row.payment_method,
        row.description.as_deref().unwrap_or("-"),
        row.tags.join(",")
    );
}

fn print_group_expense(row: &GroupExpenseRow) {
    let splits: Vec<String> = row
        .splits
        .iter()
        .map(|(name, share)| format!("{name}={share}"))
        .collect();
    println!(
        "#{} {} {} {} {} {} [{}] by {} splits {}",
        row.id,
        row.date,
        row.amount,
        row.category,
        row.payment_method,
        row.description.as_deref().unwrap_or("-"),
        row.tags.join(","),
        row.created_by,
        splits.join(",")
    );
}

struct Shell {
    engine: Engine,
    session: Option<Session>,
}

impl Shell {
    async fn dispatch(&mut self, verb: &str, args: &[&str]) -> Result<(), ShellError> {
        match verb {
            "help" => {
                print_help();
                Ok(())
            }
            "login" => self.login(args).await,
            "logout" => {
                self.session = None;
                println!("logged out");
                Ok(())
            }
            "add_user" => self.add_user(args).await,
            "update_user" => self.update_user(args).await,
            "delete_user" => self.delete_user(args).await,
            "list_users" => self.list_users(args).await,
            "add_category" => self.add_category(args).await,
            "add_payment_method" => self.add_payment_method(args).await,
            "add_tag" => self.add_tag(args).await,
            "delete_tag" => self.delete_tag(args).await,
            "list_categories" => self.list_categories(args).await,
            "list_payment_methods" => self.list_payment_methods(args).await,
            "list_tags" => self.list_tags(args).await,
            "add_expense" => self.add_expense(args).await,
            "update_expense" => self.update_expense(args).await,
            "delete_expense" => self.delete_expense(args).await,
            "list_expenses" => self.list_expenses(args).await,
            "add_group" => self.add_group(args).await,
            "add_user_to_group" => self.add_user_to_group(args).await,
            "delete_group" => self.delete_group(args).await,
            "add_group_expense" => self.add_group_expense(args).await,
            "report" => self.report(args).await,
            "report_group_expenses" => self.report_group_expenses(args).await,
            "report_group_category_spending" => self.report_group_category(args).await,
            "report_group_tag_usage" => self.report_group_tags(args).await,
            "report_group_member_spending" => self.report_group_members(args).await,
            "import_expenses" => self.import_expenses(args).await,
            "export_csv" => self.export_csv(args).await,
            "import_group_csv" => self.import_group_csv(args).await,
            "export_group_csv" => self.export_group_csv(args).await,
            other => Err(usage(format!(
                "unknown command: {other} (type 'help' for the list)"
            ))),
        }
    }

    fn require_session(&self) -> Result<&Session, ShellError> {
        self.session
            .as_ref()
            .ok_or_else(|| ShellError::Ledger(LedgerError::Forbidden("not logged in".to_string())))
    }

    async fn login(&mut self, args: &[&str]) -> Result<(), ShellError> {
        let [username, password] = args else {
            return Err(usage("usage: login <user> <secret>"));
        };
        let session = self.engine.login(username, password).await?;
        println!("logged in as {} ({})", session.username, session.role);
        self.session = Some(session);
        Ok(())
    }

    async fn add_user(&self, args: &[&str]) -> Result<(), ShellError> {
        let [username, password, role] = args else {
            return Err(usage("usage: add_user <user> <secret> <role>"));
        };
        let session = self.require_session()?;
        let role = Role::try_from(*role)?;
        self.engine
            .add_user(session, username, password, role)
            .await?;
        println!("user {username} added");
        Ok(())
    }

    async fn update_user(&self, args: &[&str]) -> Result<(), ShellError> {
        let [username, field, value] = args else {
            return Err(usage("usage: update_user <user> <field> <value>"));
        };
        let session = self.require_session()?;
        let field = UserField::try_from(*field)?;
        self.engine
            .update_user(session, username, field, value)
            .await?;
        println!("user {username} updated");
        Ok(())
    }

    async fn delete_user(&self, args: &[&str]) -> Result<(), ShellError> {
        let [username] = args else {
            return Err(usage("usage: delete_user <user>"));
        };
        let session = self.require_session()?;
        self.engine.delete_user(session, username).await?;
        println!("user {username} deleted");
        Ok(())
    }

    async fn list_users(&self, args: &[&str]) -> Result<(), ShellError> {
        if !args.is_empty() {
            return Err(usage("usage: list_users"));
        }
        let session = self.require_session()?;
        for (username, role) in self.engine.list_users(session).await? {
            println!("{username} ({role})");
        }
        Ok(())
    }

    async fn add_category(&self, args: &[&str]) -> Result<(), ShellError> {
        let [name] = args else {
            return Err(usage("usage: add_category <name>"));
        };
        let session = self.require_session()?;
        self.engine.add_category(session, name).await?;
        println!("category {name} added");
        Ok(())
    }

    async fn add_payment_method(&self, args: &[&str]) -> Result<(), ShellError> {
        let [name] = args else {
            return Err(usage("usage: add_payment_method <name>"));
        };
        let session = self.require_session()?;
        self.engine.add_payment_method(session, name).await?;
        println!("payment method {name} added");
        Ok(())
    }

    async fn add_tag(&self, args: &[&str]) -> Result<(), ShellError> {
        let [name] = args else {
            return Err(usage("usage: add_tag <name>"));
        };
        let session = self.require_session()?;
        self.engine.add_tag(session, name).await?;
        println!("tag {name} added");
        Ok(())
    }

    async fn delete_tag(&self, args: &[&str]) -> Result<(), ShellError> {
        let [name] = args else {
            return Err(usage("usage: delete_tag <name>"));
        };
        let session = self.require_session()?;
        self.engine.delete_tag(session, name).await?;
        println!("tag {name} deleted");
        Ok(())
    }

    async fn list_categories(&self, args: &[&str]) -> Result<(), ShellError> {
        if !args.is_empty() {
            return Err(usage("usage: list_categories"));
        }
        let session = self.require_session()?;
        for name in self.engine.list_categories(session).await? {
            println!("{name}");
        }
        Ok(())
    }

    async fn list_payment_methods(&self, args: &[&str]) -> Result<(), ShellError> {
        if !args.is_empty() {
            return Err(usage("usage: list_payment_methods"));
        }
        let session = self.require_session()?;
        for name in self.engine.list_payment_methods(session).await? {
            println!("{name}");
        }
        Ok(())
    }

    async fn list_tags(&self, args: &[&str]) -> Result<(), ShellError> {
        if !args.is_empty() {
            return Err(usage("usage: list_tags"));
        }
        let session = self.require_session()?;
        for name in self.engine.list_tags(session).await? {
            println!("{name}");
        }
        Ok(())
    }

    async fn add_expense(&self, args: &[&str]) -> Result<(), ShellError> {
        let (amount, category, method, date, description, tags) = match args {
            [a, c, m, d, desc] => (a, c, m, d, desc, Vec::new()),
            [a, c, m, d, desc, tags] => (a, c, m, d, desc, split_csv(tags)),
            _ => {
                return Err(usage(
                    "usage: add_expense <amount> <category> <payment_method> \
                     <YYYY-MM-DD> <description> [comma-tags]",
                ));
            }
        };
        let session = self.require_session()?;
        let amount: Money = amount.parse()?;
        let date = parse_ymd(date)?;
        let id = self
            .engine
            .add_expense(session, amount, category, method, date, Some(*description), &tags)
            .await?;
        println!("expense #{id} added");
        Ok(())
    }

    async fn update_expense(&self, args: &[&str]) -> Result<(), ShellError> {
        let [id, field, value] = args else {
            return Err(usage("usage: update_expense <id> <field> <value>"));
        };
        let session = self.require_session()?;
        let id: i32 = id
            .parse()
            .map_err(|_| usage(format!("invalid expense id: {id}")))?;
        let field = ExpenseField::try_from(*field)?;
        self.engine
            .update_expense(session, id, field, value)
            .await?;
        println!("expense #{id} updated");
        Ok(())
    }

    async fn delete_expense(&self, args: &[&str]) -> Result<(), ShellError> {
        let [id] = args else {
            return Err(usage("usage: delete_expense <id>"));
        };
        let session = self.require_session()?;
        let id: i32 = id
            .parse()
            .map_err(|_| usage(format!("invalid expense id: {id}")))?;
        self.engine.delete_expense(session, id).await?;
        println!("expense #{id} deleted");
        Ok(())
    }

    async fn list_expenses(&self, args: &[&str]) -> Result<(), ShellError> {
        let session = self.require_session()?;
        let filters = parse_filters(args)?;
        let rows = self.engine.list_expenses(session, &filters).await?;
        for row in &rows {
            print_expense(row);
        }
        println!("{} expense(s)", rows.len());
        Ok(())
    }

    async fn add_group(&self, args: &[&str]) -> Result<(), ShellError> {
        let [name, description] = args else {
            return Err(usage("usage: add_group <name> <description>"));
        };
        let session = self.require_session()?;
        self.engine
            .create_group(session, name, Some(*description))
            .await?;
        println!("group {name} created");
        Ok(())
    }

    async fn add_user_to_group(&self, args: &[&str]) -> Result<(), ShellError> {
        let [username, group] = args else {
            return Err(usage("usage: add_user_to_group <user> <group>"));
        };
        let session = self.require_session()?;
        self.engine
            .add_user_to_group(session, username, group)
            .await?;
        println!("{username} added to {group}");
        Ok(())
    }

    async fn delete_group(&self, args: &[&str]) -> Result<(), ShellError> {
        let [group] = args else {
            return Err(usage("usage: delete_group <group>"));
        };
        let session = self.require_session()?;
        self.engine.delete_group(session, group).await?;
        println!("group {group} deleted");
        Ok(())
    }

    async fn add_group_expense(&self, args: &[&str]) -> Result<(), ShellError> {
        let (amount, group, category, method, date, description, tags, participants) = match args
        {
            [a, g, c, m, d, desc] => (a, g, c, m, d, desc, Vec::new(), Vec::new()),
            [a, g, c, m, d, desc, tags] => {
                (a, g, c, m, d, desc, split_csv(tags), Vec::new())
            }
            [a, g, c, m, d, desc, tags, users] => {
                (a, g, c, m, d, desc, split_csv(tags), split_csv(users))
            }
            _ => {
                return Err(usage(
                    "usage: add_group_expense <amount> <group> <category> \
                     <payment_method> <YYYY-MM-DD> <description> [comma-tags|-] \
                     [comma-usernames]",
                ));
            }
        };
        let session = self.require_session()?;
        let amount: Money = amount.parse()?;
        let date = parse_ymd(date)?;
        let id = self
            .engine
            .add_group_expense(
                session,
                amount,
                group,
                category,
                method,
                date,
                Some(*description),
                &tags,
                &participants,
            )
            .await?;
        println!("group expense #{id} added");
        Ok(())
    }

    async fn report(&self, args: &[&str]) -> Result<(), ShellError> {
        let session = self.require_session()?;
        let Some((sub, rest)) = args.split_first() else {
            return Err(usage(
                "usage: report <top|category_spending|above_average|monthly_category|\
                 highest_spender|frequent_category|payment_method_usage|tag_counts> [args]",
            ));
        };
        match *sub {
            "top" => {
                let [n, start, end] = rest else {
                    return Err(usage("usage: report top <n> <start> <end>"));
                };
                let n: u64 = n.parse().map_err(|_| usage(format!("invalid count: {n}")))?;
                let start = parse_ymd(start)?;
                let end = parse_ymd(end)?;
                let rows = self.engine.top_expenses(session, n, start, end).await?;
                for row in &rows {
                    print_expense(row);
                }
            }
            "category_spending" => {
                let [category] = rest else {
                    return Err(usage("usage: report category_spending <category>"));
                };
                match self.engine.category_spending(session, category).await? {
                    Some(total) => println!("{category}: {total}"),
                    None => println!("no expenses for {category}"),
                }
            }
            "above_average" => {
                let rows = self.engine.above_average_expenses(session).await?;
                for row in &rows {
                    print_expense(row);
                }
            }
            "monthly_category" => {
                for entry in self.engine.monthly_category_spending(session).await? {
                    println!(
                        "{} {}: {} ({} expenses)",
                        entry.month, entry.category, entry.total, entry.count
                    );
                }
            }
            "highest_spender" => {
                for entry in self.engine.highest_spender_per_month(session).await? {
                    println!("{}: {} {}", entry.month, entry.username, entry.total);
                }
            }
            "frequent_category" => {
                for entry in self.engine.frequent_categories(session).await? {
                    println!("{}: {} expenses", entry.category, entry.count);
                }
            }
            "payment_method_usage" => {
                for entry in self.engine.payment_method_usage(session).await? {
                    println!(
                        "{}: {} ({} expenses)",
                        entry.payment_method, entry.total, entry.count
                    );
                }
            }
            "tag_counts" => {
                for entry in self.engine.tag_expense_counts(session).await? {
                    println!("{}: {} expenses", entry.tag, entry.count);
                }
            }
            other => return Err(usage(format!("unknown report: {other}"))),
        }
        Ok(())
    }

    async fn report_group_expenses(&self, args: &[&str]) -> Result<(), ShellError> {
        let Some((group, rest)) = args.split_first() else {
            return Err(usage("usage: report_group_expenses <group> [--key=value]*"));
        };
        let session = self.require_session()?;
        let filters = parse_filters(rest)?;
        let rows = self
            .engine
            .list_group_expenses(session, group, &filters)
            .await?;
        for row in &rows {
            print_group_expense(row);
        }
        println!("{} expense(s)", rows.len());
        Ok(())
    }

    async fn report_group_category(&self, args: &[&str]) -> Result<(), ShellError> {
        let [group, category] = args else {
            return Err(usage(
                "usage: report_group_category_spending <group> <category>",
            ));
        };
        let session = self.require_session()?;
        match self
            .engine
            .group_category_spending(session, group, category)
            .await?
        {
            Some(total) => println!("{group} / {category}: {total}"),
            None => println!("no group expenses for {category}"),
        }
        Ok(())
    }

    async fn report_group_tags(&self, args: &[&str]) -> Result<(), ShellError> {
        let [group] = args else {
            return Err(usage("usage: report_group_tag_usage <group>"));
        };
        let session = self.require_session()?;
        for entry in self.engine.group_tag_usage(session, group).await? {
            println!("{}: {} expenses", entry.tag, entry.count);
        }
        Ok(())
    }

    async fn report_group_members(&self, args: &[&str]) -> Result<(), ShellError> {
        let [group] = args else {
            return Err(usage("usage: report_group_member_spending <group>"));
        };
        let session = self.require_session()?;
        for entry in self.engine.group_member_spending(session, group).await? {
            println!("{}: {}", entry.username, entry.total);
        }
        Ok(())
    }

    async fn import_expenses(&self, args: &[&str]) -> Result<(), ShellError> {
        let [path] = args else {
            return Err(usage("usage: import_expenses <path>"));
        };
        let session = self.require_session()?;
        let report = self.engine.import_expenses(session, Path::new(path)).await?;
        println!("imported {} row(s)", report.imported);
        for (row, reason) in &report.skipped {
            println!("row {row} skipped: {reason}");
        }
        Ok(())
    }

    async fn export_csv(&self, args: &[&str]) -> Result<(), ShellError> {
        let Some((path, rest)) = args.split_first() else {
            return Err(usage("usage: export_csv <path> sort-on <field>"));
        };
        let session = self.require_session()?;
        let sort = parse_sort(rest)?;
        let count = self
            .engine
            .export_csv(session, Path::new(path), sort)
            .await?;
        println!("exported {count} row(s) to {path}");
        Ok(())
    }

    async fn import_group_csv(&self, args: &[&str]) -> Result<(), ShellError> {
        let [group, path] = args else {
            return Err(usage("usage: import_group_csv <group> <path>"));
        };
        let session = self.require_session()?;
        let report = self
            .engine
            .import_group_csv(session, group, Path::new(path))
            .await?;
        println!("imported {} row(s)", report.imported);
        for (row, reason) in &report.skipped {
            println!("row {row} skipped: {reason}");
        }
        Ok(())
    }

    async fn export_group_csv(&self, args: &[&str]) -> Result<(), ShellError> {
        let Some((group, rest)) = args.split_first() else {
            return Err(usage("usage: export_group_csv <group> <path> sort-on <field>"));
        };
        let Some((path, rest)) = rest.split_first() else {
            return Err(usage("usage: export_group_csv <group> <path> sort-on <field>"));
        };
        let session = self.require_session()?;
        let sort = parse_sort(rest)?;
        let count = self
            .engine
            .export_group_csv(session, group, Path::new(path), sort)
            .await?;
        println!("exported {count} row(s) to {path}");
        Ok(())
    }
}

fn print_help() {
    println!(
        "\
session:
  login <user> <secret>                 logout
users (Admin):
  add_user <user> <secret> <role>       update_user <user> <password|role> <value>
  delete_user <user>                    list_users
taxonomy:
  add_category <name>                   add_payment_method <name>
  add_tag <name>                        delete_tag <name>
  list_categories                       list_payment_methods
  list_tags
expenses:
  add_expense <amount> <category> <payment_method> <YYYY-MM-DD> <description> [tags]
  update_expense <id> <field> <value>   delete_expense <id>
  list_expenses [--category=|--payment_method=|--min_amount=|--max_amount=|--date=|--tag=]*
groups:
  add_group <name> <description>        add_user_to_group <user> <group>
  delete_group <group>
  add_group_expense <amount> <group> <category> <payment_method> <YYYY-MM-DD> \
<description> [tags|-] [usernames]
reports:
  report top <n> <start> <end>          report category_spending <category>
  report above_average                  report monthly_category
  report highest_spender                report frequent_category
  report payment_method_usage           report tag_counts
  report_group_expenses <group> [--key=value]*
  report_group_category_spending <group> <category>
  report_group_tag_usage <group>        report_group_member_spending <group>
transfer:
  import_expenses <path>                export_csv <path> sort-on <field>
  import_group_csv <group> <path>       export_group_csv <group> <path> sort-on <field>"
    );
}
