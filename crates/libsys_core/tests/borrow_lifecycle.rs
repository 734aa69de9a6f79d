use libsys_core::db::open_db_in_memory;
use libsys_core::{
    BorrowQuery, BorrowState, ConflictReason, EntityRef, LibraryError, LibraryService, NewBook,
    NewMember, SqliteLibraryRepository, DAY_MS, MAX_STOCK,
};

const NOW: i64 = 1_700_000_000_000;

#[test]
fn borrow_until_out_of_stock_then_refuse() {
    let mut conn = open_db_in_memory().unwrap();
    let mut service = LibraryService::new(SqliteLibraryRepository::new(&mut conn));
    let member = service
        .add_member(&NewMember::new("Ada", "ada@example.org"))
        .unwrap();
    let book = service
        .add_book(&NewBook::new("T", "Au", "Fiction", 2))
        .unwrap();

    let first = service
        .borrow_book_at(member.member_id, book.book_id, NOW)
        .unwrap();
    assert_eq!(first.state(), BorrowState::Open);
    assert_eq!(service.get_book(book.book_id).unwrap().unwrap().stock, 1);
    assert_eq!(open_records(&service, book.book_id), 1);

    service
        .borrow_book_at(member.member_id, book.book_id, NOW + 1)
        .unwrap();
    assert_eq!(service.get_book(book.book_id).unwrap().unwrap().stock, 0);

    let err = service
        .borrow_book_at(member.member_id, book.book_id, NOW + 2)
        .unwrap_err();
    assert!(matches!(
        err,
        LibraryError::Conflict(ConflictReason::OutOfStock(id)) if id == book.book_id
    ));
    assert_eq!(service.get_book(book.book_id).unwrap().unwrap().stock, 0);
    assert_eq!(open_records(&service, book.book_id), 2);
}

#[test]
fn borrow_with_unknown_member_or_book_changes_nothing() {
    let mut conn = open_db_in_memory().unwrap();
    let mut service = LibraryService::new(SqliteLibraryRepository::new(&mut conn));
    let member = service
        .add_member(&NewMember::new("Ada", "ada@example.org"))
        .unwrap();
    let book = service
        .add_book(&NewBook::new("Dune", "Frank Herbert", "Fiction", 1))
        .unwrap();

    let err = service.borrow_book_at(999, book.book_id, NOW).unwrap_err();
    assert!(matches!(err, LibraryError::NotFound(EntityRef::Member(999))));

    let err = service
        .borrow_book_at(member.member_id, 999, NOW)
        .unwrap_err();
    assert!(matches!(err, LibraryError::NotFound(EntityRef::Book(999))));

    assert_eq!(service.get_book(book.book_id).unwrap().unwrap().stock, 1);
    assert!(service
        .list_borrows(&BorrowQuery::default())
        .unwrap()
        .is_empty());
}

#[test]
fn return_closes_record_and_restores_stock() {
    let mut conn = open_db_in_memory().unwrap();
    let mut service = LibraryService::new(SqliteLibraryRepository::new(&mut conn));
    let member = service
        .add_member(&NewMember::new("Ada", "ada@example.org"))
        .unwrap();
    let book = service
        .add_book(&NewBook::new("Dune", "Frank Herbert", "Fiction", 1))
        .unwrap();

    let borrowed = service
        .borrow_book_at(member.member_id, book.book_id, NOW)
        .unwrap();
    let returned = service
        .return_book_at(member.member_id, book.book_id, NOW + DAY_MS)
        .unwrap();

    assert_eq!(returned.record_id, borrowed.record_id);
    assert_eq!(returned.state(), BorrowState::Closed);
    assert_eq!(returned.returned_at, Some(NOW + DAY_MS));
    assert_eq!(service.get_book(book.book_id).unwrap().unwrap().stock, 1);
    assert_eq!(open_records(&service, book.book_id), 0);

    // A closed record is never reopened: a second return finds nothing open.
    let err = service
        .return_book_at(member.member_id, book.book_id, NOW + 2 * DAY_MS)
        .unwrap_err();
    assert!(matches!(
        err,
        LibraryError::NotFound(EntityRef::OpenBorrow { .. })
    ));
    let history = service.list_borrows(&BorrowQuery::default()).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].returned_at, Some(NOW + DAY_MS));
    assert_eq!(service.get_book(book.book_id).unwrap().unwrap().stock, 1);
}

#[test]
fn return_without_open_record_is_not_found() {
    let mut conn = open_db_in_memory().unwrap();
    let mut service = LibraryService::new(SqliteLibraryRepository::new(&mut conn));
    let member = service
        .add_member(&NewMember::new("Ada", "ada@example.org"))
        .unwrap();
    let book = service
        .add_book(&NewBook::new("Dune", "Frank Herbert", "Fiction", 1))
        .unwrap();

    let err = service
        .return_book_at(member.member_id, book.book_id, NOW)
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        format!(
            "no active borrow record found for member {} and book {}",
            member.member_id, book.book_id
        )
    );
    assert_eq!(service.get_book(book.book_id).unwrap().unwrap().stock, 1);
}

#[test]
fn return_with_two_open_records_for_pair_is_refused() {
    let mut conn = open_db_in_memory().unwrap();
    let mut service = LibraryService::new(SqliteLibraryRepository::new(&mut conn));
    let member = service
        .add_member(&NewMember::new("Ada", "ada@example.org"))
        .unwrap();
    let book = service
        .add_book(&NewBook::new("Dune", "Frank Herbert", "Fiction", 2))
        .unwrap();
    service
        .borrow_book_at(member.member_id, book.book_id, NOW)
        .unwrap();
    service
        .borrow_book_at(member.member_id, book.book_id, NOW + 1)
        .unwrap();

    let err = service
        .return_book_at(member.member_id, book.book_id, NOW + 2)
        .unwrap_err();
    assert!(matches!(
        err,
        LibraryError::Conflict(ConflictReason::AmbiguousReturn {
            open_records: 2,
            ..
        })
    ));
    assert_eq!(service.get_book(book.book_id).unwrap().unwrap().stock, 0);
    assert_eq!(open_records(&service, book.book_id), 2);
}

#[test]
fn return_by_other_member_does_not_close_record() {
    let mut conn = open_db_in_memory().unwrap();
    let mut service = LibraryService::new(SqliteLibraryRepository::new(&mut conn));
    let ada = service
        .add_member(&NewMember::new("Ada", "ada@example.org"))
        .unwrap();
    let bob = service
        .add_member(&NewMember::new("Bob", "bob@example.org"))
        .unwrap();
    let book = service
        .add_book(&NewBook::new("Dune", "Frank Herbert", "Fiction", 1))
        .unwrap();
    service
        .borrow_book_at(ada.member_id, book.book_id, NOW)
        .unwrap();

    assert!(service
        .return_book_at(bob.member_id, book.book_id, NOW + 1)
        .is_err());
    assert_eq!(open_records(&service, book.book_id), 1);
}

#[test]
fn delete_with_open_borrow_is_refused_and_store_unchanged() {
    let mut conn = open_db_in_memory().unwrap();
    let mut service = LibraryService::new(SqliteLibraryRepository::new(&mut conn));
    let member = service
        .add_member(&NewMember::new("Ada", "ada@example.org"))
        .unwrap();
    let book = service
        .add_book(&NewBook::new("Dune", "Frank Herbert", "Fiction", 1))
        .unwrap();
    service
        .borrow_book_at(member.member_id, book.book_id, NOW)
        .unwrap();

    let err = service.delete_member(member.member_id).unwrap_err();
    assert!(matches!(
        err,
        LibraryError::Conflict(ConflictReason::ActiveBorrows {
            target: EntityRef::Member(_),
            open_records: 1,
        })
    ));
    let err = service.delete_book(book.book_id).unwrap_err();
    assert!(matches!(
        err,
        LibraryError::Conflict(ConflictReason::ActiveBorrows {
            target: EntityRef::Book(_),
            ..
        })
    ));

    assert!(service.get_member(member.member_id).unwrap().is_some());
    assert!(service.get_book(book.book_id).unwrap().is_some());
    assert_eq!(open_records(&service, book.book_id), 1);
}

#[test]
fn delete_after_return_succeeds_and_keeps_history() {
    let mut conn = open_db_in_memory().unwrap();
    let mut service = LibraryService::new(SqliteLibraryRepository::new(&mut conn));
    let member = service
        .add_member(&NewMember::new("Ada", "ada@example.org"))
        .unwrap();
    let book = service
        .add_book(&NewBook::new("Dune", "Frank Herbert", "Fiction", 1))
        .unwrap();
    service
        .borrow_book_at(member.member_id, book.book_id, NOW)
        .unwrap();
    service
        .return_book_at(member.member_id, book.book_id, NOW + 1)
        .unwrap();

    service.delete_member(member.member_id).unwrap();
    service.delete_book(book.book_id).unwrap();

    let counts = service.most_borrowed(5).unwrap();
    assert_eq!(counts.len(), 1);
    assert_eq!(counts[0].book_id, book.book_id);
}

#[test]
fn stock_never_goes_negative_across_mixed_sequence() {
    let mut conn = open_db_in_memory().unwrap();
    let mut service = LibraryService::new(SqliteLibraryRepository::new(&mut conn));
    let members: Vec<_> = (0..3)
        .map(|i| {
            service
                .add_member(&NewMember::new(format!("M{i}"), format!("m{i}@example.org")))
                .unwrap()
        })
        .collect();
    let book = service
        .add_book(&NewBook::new("Dune", "Frank Herbert", "Fiction", 2))
        .unwrap();

    let mut at = NOW;
    for round in 0..4 {
        for member in &members {
            at += 1;
            let _ = service.borrow_book_at(member.member_id, book.book_id, at);
            let stock = service.get_book(book.book_id).unwrap().unwrap().stock;
            assert!(stock <= 2, "round {round}: stock {stock}");
        }
        for member in &members {
            at += 1;
            let _ = service.return_book_at(member.member_id, book.book_id, at);
        }
        let stock = service.get_book(book.book_id).unwrap().unwrap().stock;
        assert_eq!(stock as usize + open_records(&service, book.book_id), 2);
    }
}

#[test]
fn failed_record_insert_rolls_back_stock_decrement() {
    let mut conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TRIGGER block_borrow_insert
         BEFORE INSERT ON borrow_records
         BEGIN
            SELECT RAISE(ABORT, 'borrow insert blocked');
         END;",
    )
    .unwrap();

    let mut service = LibraryService::new(SqliteLibraryRepository::new(&mut conn));
    let member = service
        .add_member(&NewMember::new("Ada", "ada@example.org"))
        .unwrap();
    let book = service
        .add_book(&NewBook::new("Dune", "Frank Herbert", "Fiction", 1))
        .unwrap();

    let err = service
        .borrow_book_at(member.member_id, book.book_id, NOW)
        .unwrap_err();
    assert!(matches!(err, LibraryError::Repo(_)));
    assert_eq!(service.get_book(book.book_id).unwrap().unwrap().stock, 1);
}

#[test]
fn failed_stock_increment_rolls_back_record_close() {
    let mut conn = open_db_in_memory().unwrap();
    let (member_id, book_id) = {
        let mut service = LibraryService::new(SqliteLibraryRepository::new(&mut conn));
        let member = service
            .add_member(&NewMember::new("Ada", "ada@example.org"))
            .unwrap();
        let book = service
            .add_book(&NewBook::new("Dune", "Frank Herbert", "Fiction", 1))
            .unwrap();
        service
            .borrow_book_at(member.member_id, book.book_id, NOW)
            .unwrap();
        (member.member_id, book.book_id)
    };

    conn.execute_batch(
        "CREATE TRIGGER block_restock
         BEFORE UPDATE OF stock ON books
         BEGIN
            SELECT RAISE(ABORT, 'restock blocked');
         END;",
    )
    .unwrap();

    let mut service = LibraryService::new(SqliteLibraryRepository::new(&mut conn));
    let err = service
        .return_book_at(member_id, book_id, NOW + 1)
        .unwrap_err();
    assert!(matches!(err, LibraryError::Repo(_)));

    let open = service
        .list_borrows(&BorrowQuery {
            book_id: Some(book_id),
            open_only: true,
            ..BorrowQuery::default()
        })
        .unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].returned_at, None);
}

fn open_records(
    service: &LibraryService<SqliteLibraryRepository<'_>>,
    book_id: i64,
) -> usize {
    service
        .list_borrows(&BorrowQuery {
            book_id: Some(book_id),
            open_only: true,
            ..BorrowQuery::default()
        })
        .unwrap()
        .len()
}

#[test]
fn return_at_maximum_stock_is_refused_and_catalog_stays_readable() {
    let mut conn = open_db_in_memory().unwrap();
    let mut service = LibraryService::new(SqliteLibraryRepository::new(&mut conn));
    let member = service
        .add_member(&NewMember::new("Ada", "ada@example.org"))
        .unwrap();
    let book = service
        .add_book(&NewBook::new("Dune", "Frank Herbert", "Fiction", MAX_STOCK))
        .unwrap();
    service
        .borrow_book_at(member.member_id, book.book_id, NOW)
        .unwrap();
    service.update_stock(book.book_id, MAX_STOCK).unwrap();

    let err = service
        .return_book_at(member.member_id, book.book_id, NOW + 1)
        .unwrap_err();
    assert!(matches!(
        err,
        LibraryError::Conflict(ConflictReason::StockAtCapacity(id)) if id == book.book_id
    ));
    assert_eq!(open_records(&service, book.book_id), 1);

    let books = service.list_books().unwrap();
    assert_eq!(books.len(), 1);
    assert_eq!(books[0].stock, MAX_STOCK);

    service.update_stock(book.book_id, MAX_STOCK - 1).unwrap();
    service
        .return_book_at(member.member_id, book.book_id, NOW + 2)
        .unwrap();
    assert_eq!(service.get_book(book.book_id).unwrap().unwrap().stock, MAX_STOCK);
    assert_eq!(open_records(&service, book.book_id), 0);
}
