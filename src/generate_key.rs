// generate_key.rs
// Utility to generate a new encryption key for the credential vault

#[path = "services/vault.rs"]
mod vault;

use vault::TokenVault;

fn main() {
    println!("Generating new AES-256 encryption key...\n");

    let key = TokenVault::generate_key();

    println!("Add this to your .env file:");
    println!("─────────────────────────────────────────────────");
    println!("ENCRYPTION_MASTER_KEY={}", key);
    println!("─────────────────────────────────────────────────");
    println!("\nKeep this key secure and never commit it to version control.");
    println!("If the key is lost, stored provider tokens cannot be recovered.");
}
