//! Interactive menu loop and result rendering.
//!
//! # Invariants
//! - One command runs at a time; a failed command prints its error and the
//!   loop continues.
//! - Records are printed one JSON object per line.

use crate::command::{parse_choice, Action, Command, InputError, MenuChoice, Prompter};
use crate::config::ReportSettings;
use libsys_core::{LibraryError, LibraryRepository, LibraryService};
use log::debug;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::{self, BufRead, Write};

/// Failure of one menu action.
#[derive(Debug)]
pub enum ActionError {
    Input(InputError),
    Library(LibraryError),
    Io(io::Error),
    Render(serde_json::Error),
}

impl Display for ActionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Input(err) => write!(f, "{err}"),
            Self::Library(err) => write!(f, "{err}"),
            Self::Io(err) => write!(f, "{err}"),
            Self::Render(err) => write!(f, "failed to render result: {err}"),
        }
    }
}

impl Error for ActionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Input(err) => Some(err),
            Self::Library(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::Render(err) => Some(err),
        }
    }
}

impl From<InputError> for ActionError {
    fn from(value: InputError) -> Self {
        match value {
            InputError::Io(err) => Self::Io(err),
            other => Self::Input(other),
        }
    }
}

impl From<LibraryError> for ActionError {
    fn from(value: LibraryError) -> Self {
        Self::Library(value)
    }
}

impl From<io::Error> for ActionError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for ActionError {
    fn from(value: serde_json::Error) -> Self {
        Self::Render(value)
    }
}

/// Menu-driven front end over a [`LibraryService`].
pub struct Console<R: LibraryRepository, I: BufRead, W: Write> {
    service: LibraryService<R>,
    prompter: Prompter<I, W>,
    reports: ReportSettings,
}

impl<R: LibraryRepository, I: BufRead, W: Write> Console<R, I, W> {
    pub fn new(service: LibraryService<R>, input: I, output: W, reports: ReportSettings) -> Self {
        Self {
            service,
            prompter: Prompter::new(input, output),
            reports,
        }
    }

    /// Runs the menu until the operator exits or input ends.
    ///
    /// Only output failures end the loop with an error.
    pub fn run(&mut self) -> io::Result<()> {
        loop {
            self.print_menu()?;
            let choice = match self.prompter.ask("Enter choice") {
                Ok(choice) => choice,
                Err(InputError::Eof) => break,
                Err(InputError::Io(err)) => return Err(err),
                Err(other) => {
                    writeln!(self.prompter.output(), "Error: {other}")?;
                    continue;
                }
            };

            match parse_choice(&choice) {
                MenuChoice::Exit => break,
                MenuChoice::Invalid => {
                    writeln!(self.prompter.output(), "Invalid choice. Try again.")?;
                }
                MenuChoice::Run(action) => match self.run_action(action) {
                    Ok(()) => {}
                    Err(ActionError::Input(InputError::Eof)) => break,
                    Err(ActionError::Io(err)) => return Err(err),
                    Err(err) => {
                        debug!(
                            "event=console_action module=cli status=error action={}",
                            action.number()
                        );
                        writeln!(self.prompter.output(), "Error: {err}")?;
                    }
                },
            }
        }

        writeln!(self.prompter.output(), "Exiting...")?;
        Ok(())
    }

    /// Prompts for `action`'s fields, then executes it.
    pub fn run_action(&mut self, action: Action) -> Result<(), ActionError> {
        let command = self.prompter.read_command(action)?;
        self.execute(command)
    }

    /// Executes one parsed command and prints its result.
    pub fn execute(&mut self, command: Command) -> Result<(), ActionError> {
        match command {
            Command::AddMember(member) => {
                let created = self.service.add_member(&member)?;
                self.print_record("Member added:", &created)
            }
            Command::AddBook(book) => {
                let created = self.service.add_book(&book)?;
                self.print_record("Book added:", &created)
            }
            Command::ListBooks => {
                let books = self.service.list_books()?;
                self.print_rows(&books)
            }
            Command::SearchBooks { field, pattern } => {
                let books = self.service.search_books(field, &pattern)?;
                self.print_rows(&books)
            }
            Command::UpdateStock { book_id, stock } => {
                let updated = self.service.update_stock(book_id, stock)?;
                self.print_record("Book updated:", &updated)
            }
            Command::UpdateMemberEmail { member_id, email } => {
                let updated = self.service.update_member_email(member_id, &email)?;
                self.print_record("Member updated:", &updated)
            }
            Command::DeleteMember(member_id) => {
                self.service.delete_member(member_id)?;
                self.print_line(&format!("Member {member_id} deleted."))
            }
            Command::DeleteBook(book_id) => {
                self.service.delete_book(book_id)?;
                self.print_line(&format!("Book {book_id} deleted."))
            }
            Command::BorrowBook { member_id, book_id } => {
                self.service.borrow_book(member_id, book_id)?;
                self.print_line("Book borrowed.")
            }
            Command::ReturnBook { member_id, book_id } => {
                self.service.return_book(member_id, book_id)?;
                self.print_line("Book returned.")
            }
            Command::OverdueBooks => {
                let records = self.service.overdue_books(self.reports.overdue_days)?;
                self.print_line("Overdue books:")?;
                self.print_rows(&records)
            }
            Command::MostBorrowed => {
                let top = self.service.most_borrowed(self.reports.top_borrowed)?;
                self.print_line(&format!(
                    "Top {} borrowed books:",
                    self.reports.top_borrowed
                ))?;
                for entry in top {
                    self.print_line(&format!(
                        "Book ID {}: {} times",
                        entry.book_id, entry.count
                    ))?;
                }
                Ok(())
            }
            Command::BooksPerMember => {
                let counts = self.service.books_per_member()?;
                self.print_line("Books borrowed per member:")?;
                for entry in counts {
                    self.print_line(&format!(
                        "Member ID {}: {} books",
                        entry.member_id, entry.count
                    ))?;
                }
                Ok(())
            }
        }
    }

    fn print_menu(&mut self) -> io::Result<()> {
        let output = self.prompter.output();
        writeln!(output)?;
        writeln!(output, "Library Management System")?;
        for action in Action::ALL {
            writeln!(output, "{}. {}", action.number(), action.label())?;
        }
        writeln!(output, "0. Exit")
    }

    fn print_line(&mut self, line: &str) -> Result<(), ActionError> {
        writeln!(self.prompter.output(), "{line}")?;
        Ok(())
    }

    fn print_record<T: Serialize>(&mut self, heading: &str, record: &T) -> Result<(), ActionError> {
        let json = serde_json::to_string(record)?;
        writeln!(self.prompter.output(), "{heading} {json}")?;
        Ok(())
    }

    fn print_rows<T: Serialize>(&mut self, rows: &[T]) -> Result<(), ActionError> {
        for row in rows {
            let json = serde_json::to_string(row)?;
            writeln!(self.prompter.output(), "{json}")?;
        }
        Ok(())
    }
}
