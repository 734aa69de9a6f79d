//! Operator menu actions and typed command parsing.
//!
//! # Responsibility
//! - Map menu choices to actions.
//! - Prompt for each action's fields and turn free text into a typed
//!   [`Command`], rejecting malformed input before the store is touched.

use libsys_core::{BookField, BookId, MemberId, NewBook, NewMember, UnknownBookField};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::{self, BufRead, Write};

/// Numbered menu entries, in menu order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    AddMember,
    AddBook,
    ListBooks,
    SearchBooks,
    UpdateStock,
    UpdateMember,
    DeleteMember,
    DeleteBook,
    BorrowBook,
    ReturnBook,
    OverdueReport,
    MostBorrowedReport,
    BooksPerMemberReport,
}

impl Action {
    pub const ALL: [Action; 13] = [
        Action::AddMember,
        Action::AddBook,
        Action::ListBooks,
        Action::SearchBooks,
        Action::UpdateStock,
        Action::UpdateMember,
        Action::DeleteMember,
        Action::DeleteBook,
        Action::BorrowBook,
        Action::ReturnBook,
        Action::OverdueReport,
        Action::MostBorrowedReport,
        Action::BooksPerMemberReport,
    ];

    /// 1-based menu number.
    pub fn number(self) -> usize {
        Self::ALL
            .iter()
            .position(|action| *action == self)
            .map_or(0, |index| index + 1)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::AddMember => "Add Member",
            Self::AddBook => "Add Book",
            Self::ListBooks => "List Books",
            Self::SearchBooks => "Search Books",
            Self::UpdateStock => "Update Stock",
            Self::UpdateMember => "Update Member Info",
            Self::DeleteMember => "Delete Member",
            Self::DeleteBook => "Delete Book",
            Self::BorrowBook => "Borrow Book",
            Self::ReturnBook => "Return Book",
            Self::OverdueReport => "Overdue Books Report",
            Self::MostBorrowedReport => "Most Borrowed Books Report",
            Self::BooksPerMemberReport => "Books Borrowed Per Member Report",
        }
    }
}

/// Parsed top-level menu input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuChoice {
    Run(Action),
    Exit,
    Invalid,
}

pub fn parse_choice(input: &str) -> MenuChoice {
    let trimmed = input.trim();
    if trimmed == "0" {
        return MenuChoice::Exit;
    }
    match trimmed.parse::<usize>() {
        Ok(number) if (1..=Action::ALL.len()).contains(&number) => {
            MenuChoice::Run(Action::ALL[number - 1])
        }
        _ => MenuChoice::Invalid,
    }
}

/// Fully parsed operator request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    AddMember(NewMember),
    AddBook(NewBook),
    ListBooks,
    SearchBooks { field: BookField, pattern: String },
    UpdateStock { book_id: BookId, stock: u32 },
    UpdateMemberEmail { member_id: MemberId, email: String },
    DeleteMember(MemberId),
    DeleteBook(BookId),
    BorrowBook { member_id: MemberId, book_id: BookId },
    ReturnBook { member_id: MemberId, book_id: BookId },
    OverdueBooks,
    MostBorrowed,
    BooksPerMember,
}

/// Failure while reading or parsing prompted input.
#[derive(Debug)]
pub enum InputError {
    /// Input stream closed.
    Eof,
    Io(io::Error),
    InvalidNumber { field: &'static str, value: String },
    UnknownField(UnknownBookField),
}

impl Display for InputError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Eof => write!(f, "input closed"),
            Self::Io(err) => write!(f, "{err}"),
            Self::InvalidNumber { field, value } => {
                write!(f, "{field} must be a non-negative whole number, got `{value}`")
            }
            Self::UnknownField(err) => write!(f, "{err}"),
        }
    }
}

impl Error for InputError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::UnknownField(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for InputError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<UnknownBookField> for InputError {
    fn from(value: UnknownBookField) -> Self {
        Self::UnknownField(value)
    }
}

/// Line-oriented prompt over any reader/writer pair.
pub struct Prompter<I: BufRead, W: Write> {
    input: I,
    output: W,
}

impl<I: BufRead, W: Write> Prompter<I, W> {
    pub fn new(input: I, output: W) -> Self {
        Self { input, output }
    }

    pub fn output(&mut self) -> &mut W {
        &mut self.output
    }

    /// Prints `label` and returns the next input line, trimmed.
    pub fn ask(&mut self, label: &str) -> Result<String, InputError> {
        write!(self.output, "{label}: ")?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(InputError::Eof);
        }
        Ok(line.trim().to_string())
    }

    fn ask_id(&mut self, label: &str, field: &'static str) -> Result<i64, InputError> {
        let value = self.ask(label)?;
        parse_id(field, &value)
    }

    fn ask_count(&mut self, label: &str, field: &'static str) -> Result<u32, InputError> {
        let value = self.ask(label)?;
        value
            .parse::<u32>()
            .map_err(|_| InputError::InvalidNumber { field, value })
    }

    /// Prompts for the fields `action` needs.
    pub fn read_command(&mut self, action: Action) -> Result<Command, InputError> {
        let command = match action {
            Action::AddMember => {
                let name = self.ask("Enter name")?;
                let email = self.ask("Enter email")?;
                Command::AddMember(NewMember::new(name, email))
            }
            Action::AddBook => {
                let title = self.ask("Enter title")?;
                let author = self.ask("Enter author")?;
                let category = self.ask("Enter category")?;
                let stock = self.ask_count("Enter stock count", "stock")?;
                Command::AddBook(NewBook::new(title, author, category, stock))
            }
            Action::ListBooks => Command::ListBooks,
            Action::SearchBooks => {
                let field = self
                    .ask("Search by (title/author/category)")?
                    .parse::<BookField>()?;
                let pattern = self.ask("Enter keyword")?;
                Command::SearchBooks { field, pattern }
            }
            Action::UpdateStock => {
                let book_id = self.ask_id("Enter book ID", "book ID")?;
                let stock = self.ask_count("Enter new stock", "stock")?;
                Command::UpdateStock { book_id, stock }
            }
            Action::UpdateMember => {
                let member_id = self.ask_id("Enter member ID", "member ID")?;
                let email = self.ask("Enter new email")?;
                Command::UpdateMemberEmail { member_id, email }
            }
            Action::DeleteMember => {
                Command::DeleteMember(self.ask_id("Enter member ID to delete", "member ID")?)
            }
            Action::DeleteBook => {
                Command::DeleteBook(self.ask_id("Enter book ID to delete", "book ID")?)
            }
            Action::BorrowBook => {
                let member_id = self.ask_id("Enter member ID", "member ID")?;
                let book_id = self.ask_id("Enter book ID", "book ID")?;
                Command::BorrowBook { member_id, book_id }
            }
            Action::ReturnBook => {
                let member_id = self.ask_id("Enter member ID", "member ID")?;
                let book_id = self.ask_id("Enter book ID", "book ID")?;
                Command::ReturnBook { member_id, book_id }
            }
            Action::OverdueReport => Command::OverdueBooks,
            Action::MostBorrowedReport => Command::MostBorrowed,
            Action::BooksPerMemberReport => Command::BooksPerMember,
        };
        Ok(command)
    }
}

fn parse_id(field: &'static str, value: &str) -> Result<i64, InputError> {
    match value.parse::<i64>() {
        Ok(id) if id >= 0 => Ok(id),
        _ => Err(InputError::InvalidNumber {
            field,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_choice, Action, Command, InputError, MenuChoice, Prompter};
    use libsys_core::{BookField, NewBook};
    use std::io::Cursor;

    fn read(action: Action, input: &str) -> Result<Command, InputError> {
        let mut prompter = Prompter::new(Cursor::new(input.to_string()), Vec::new());
        prompter.read_command(action)
    }

    #[test]
    fn parse_choice_maps_menu_numbers() {
        assert_eq!(parse_choice(" 1 "), MenuChoice::Run(Action::AddMember));
        assert_eq!(
            parse_choice("13"),
            MenuChoice::Run(Action::BooksPerMemberReport)
        );
        assert_eq!(parse_choice("0"), MenuChoice::Exit);
        assert_eq!(parse_choice("14"), MenuChoice::Invalid);
        assert_eq!(parse_choice("abc"), MenuChoice::Invalid);
        assert_eq!(parse_choice(""), MenuChoice::Invalid);
    }

    #[test]
    fn action_numbers_follow_menu_order() {
        for (index, action) in Action::ALL.iter().enumerate() {
            assert_eq!(action.number(), index + 1);
        }
    }

    #[test]
    fn add_book_reads_typed_fields() {
        let command = read(Action::AddBook, "T\nAu\nFiction\n2\n").unwrap();
        assert_eq!(command, Command::AddBook(NewBook::new("T", "Au", "Fiction", 2)));
    }

    #[test]
    fn negative_or_text_stock_is_rejected() {
        let err = read(Action::AddBook, "T\nAu\nFiction\n-1\n").unwrap_err();
        assert!(matches!(err, InputError::InvalidNumber { field: "stock", .. }));

        let err = read(Action::UpdateStock, "1\nmany\n").unwrap_err();
        assert!(matches!(err, InputError::InvalidNumber { field: "stock", .. }));
    }

    #[test]
    fn ids_must_be_integers() {
        let err = read(Action::BorrowBook, "one\n2\n").unwrap_err();
        assert!(matches!(
            err,
            InputError::InvalidNumber {
                field: "member ID",
                ..
            }
        ));

        let command = read(Action::ReturnBook, " 4 \n 9\n").unwrap();
        assert_eq!(
            command,
            Command::ReturnBook {
                member_id: 4,
                book_id: 9
            }
        );
    }

    #[test]
    fn search_field_is_validated() {
        let command = read(Action::SearchBooks, "Author\nherb\n").unwrap();
        assert_eq!(
            command,
            Command::SearchBooks {
                field: BookField::Author,
                pattern: "herb".to_string()
            }
        );

        let err = read(Action::SearchBooks, "isbn\n123\n").unwrap_err();
        assert!(matches!(err, InputError::UnknownField(_)));
    }

    #[test]
    fn closed_input_is_eof() {
        let err = read(Action::AddMember, "Ada\n").unwrap_err();
        assert!(matches!(err, InputError::Eof));
    }
}
