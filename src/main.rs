#[rocket::launch]
fn rocket() -> _ {
    mail_stager::init_logger();
    log::info!("starting mail-stager");
    mail_stager::rocket()
}
