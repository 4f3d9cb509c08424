use liveclass_messaging::error::AppError;
use liveclass_messaging::middleware::error_handling::map_error;

#[test]
fn validation_is_400_with_caller_visible_message() {
    let (status, msg) = map_error(&AppError::Validation("group conversations require a name".into()));
    assert_eq!(status.as_u16(), 400);
    assert_eq!(msg, "group conversations require a name");
}

#[test]
fn auth_failures_map_to_401_and_403() {
    let (status, _) = map_error(&AppError::Unauthorized);
    assert_eq!(status.as_u16(), 401);

    let (status, msg) = map_error(&AppError::Forbidden);
    assert_eq!(status.as_u16(), 403);
    assert_eq!(msg, "forbidden");
}

#[test]
fn not_found_maps_to_404() {
    let (status, _) = map_error(&AppError::NotFound);
    assert_eq!(status.as_u16(), 404);
}

#[test]
fn server_side_failures_hide_detail() {
    let (status, msg) = map_error(&AppError::Database(sqlx::Error::RowNotFound));
    assert_eq!(status.as_u16(), 500);
    assert_eq!(msg, "internal server error");

    let (status, msg) = map_error(&AppError::Config("DATABASE_URL missing".into()));
    assert_eq!(status.as_u16(), 500);
    assert!(!msg.contains("DATABASE_URL"));
}
