//! Row types used internally when reconciling a scanned service against
//! whatever the database already holds for it.

#[derive(Debug, Clone)]
pub(crate) struct ExistingService {
    pub name: String,
    pub hold_name: bool,
    pub no_sdt: bool,
}
