mod catalog_service;
mod errors;
mod loan_service;
mod overdue_detection;

pub use catalog_service::{
    FilmAvailability, add_copy, add_film, add_member, availability_of, film_availability,
    find_copy_by_id, find_film_by_title, find_member_by_number, list_films, list_members,
    number_available, rename_member, search_by_availability, search_by_title, search_combined,
};
pub use errors::{EntityKind, LendingError, Result};
pub use loan_service::{
    ServiceDependencies, borrow_copy, list_active_loans, list_loans, list_loans_for_member,
    return_copy,
};
pub use overdue_detection::find_overdue_loans;
