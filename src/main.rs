#[actix_web::main]
async fn main() -> std::io::Result<()> {
    request_payment_server::run().await
}
