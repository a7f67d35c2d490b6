//! # Send Plan Demo
//!
//! Demonstrates one message sent to a group: encrypted once, key wrapped
//! for each member and for the sender.
//!
//! ## Run
//!
//! ```bash
//! cargo run --example send_plan_demo
//! ```

use ekozir_core::{
    parse_and_validate, validate_password, CoreConfig, EkozirCore, MessageRecord, Session,
};

fn main() {
    println!("=== Ekozir Core: Group Send Demo ===\n");

    EkozirCore::initialize(CoreConfig::default()).expect("Crypto backend unavailable");

    // Step 1: Check the passwords
    println!("Step 1: Checking password strength...");

    let passwords = [
        ("Alice", "Abcdefgh123!"),
        ("Bob", "Correct-Horse-42"),
        ("Carol", "Carol-Secret-99?"),
    ];
    for (name, password) in passwords {
        let check = validate_password(password);
        println!("  {:<6} valid: {}", name, check.valid);
    }
    println!("  \"abc\" is missing: {:?}", validate_password("abc").unmet());
    println!();

    // Step 2: Derive key pairs from passwords
    println!("Step 2: Deriving key pairs (PBKDF2, 100,000 rounds each)...");

    let alice = Session::unlock(passwords[0].1).expect("Failed to unlock Alice");
    let bob = Session::unlock(passwords[1].1).expect("Failed to unlock Bob");
    let carol = Session::unlock(passwords[2].1).expect("Failed to unlock Carol");

    for (name, session) in [("Alice", &alice), ("Bob", &bob), ("Carol", &carol)] {
        println!("  {:<6} key fingerprint: {}", name, session.public_key().fingerprint());
    }
    println!();

    // Step 3: Bob pastes his key into the group form, whitespace and all
    println!("Step 3: Normalizing a pasted key...");

    let pasted = format!(
        "{{\n  \"y\": \"{}\",\n  \"x\": \"{}\",\n  \"kty\": \"EC\",\n  \"crv\": \"P-256\"\n}}",
        bob.public_key().y.as_deref().unwrap_or_default(),
        bob.public_key().x.as_deref().unwrap_or_default(),
    );
    let bob_key = parse_and_validate(&pasted).expect("Bob's key should validate");
    println!("  Canonical: {}", bob_key);
    println!("  \"not json\" -> {:?}", parse_and_validate("not json"));
    println!();

    // Step 4: Alice sends to Bob, Carol and one broken key
    println!("Step 4: Alice builds a send plan...");
    println!();
    println!("  ┌─────────────────────────────────────────────────────────────┐");
    println!("  │                       SEND PLAN                             │");
    println!("  ├─────────────────────────────────────────────────────────────┤");
    println!("  │                                                             │");
    println!("  │   \"Hello group!\" ──AES-GCM(K)──► shared content blob        │");
    println!("  │                                                             │");
    println!("  │   K ──ECDH+HKDF──► envelope for Bob                         │");
    println!("  │   K ──ECDH+HKDF──► envelope for Carol                       │");
    println!("  │   K ──ECDH+HKDF──► envelope for Alice (sender copy)         │");
    println!("  │                                                             │");
    println!("  └─────────────────────────────────────────────────────────────┘");
    println!();

    let recipients = [bob_key, carol.public_key_json(), "garbage".to_string()];
    let plan = alice
        .build_send_plan("Hello group!", &recipients)
        .expect("Failed to build send plan");

    println!("  Envelopes: {} (sender included)", plan.envelope_count());
    println!("  Delivered: {}, skipped: {}", plan.success_count(), plan.failure_count());
    for failure in &plan.failures {
        println!("  Skipped {:?}: {}", failure.recipient, failure.error);
    }
    println!("  Message hash: {}", plan.message_hash);
    println!();

    // Step 5: Everyone reads it back
    println!("Step 5: Recipients decrypt...");

    let outgoing = plan.outgoing_messages().expect("Failed to serialize envelopes");
    for (name, session, message) in [("Bob", &bob, &outgoing[0]), ("Carol", &carol, &outgoing[1])] {
        let record = MessageRecord {
            id: None,
            sender: Some(alice.public_key_json()),
            encrypted_key: Some(message.encrypted_key.clone()),
            encrypted_content: Some(message.encrypted_content.clone()),
        };

        match session.try_open_message(&record) {
            Some(text) => println!("  [OK] {} reads: \"{}\"", name, text),
            None => println!("  [FAILED] {} could not decrypt", name),
        }

        // Nobody else can open it
        match alice.try_open_message(&record) {
            Some(_) => println!("  [FAILED] Alice opened {}'s copy!", name),
            None => println!("  [OK] Alice cannot open {}'s copy", name),
        }
    }

    let sent_copy = MessageRecord {
        id: None,
        sender: Some(alice.public_key_json()),
        encrypted_key: Some(outgoing[0].encrypted_key_for_sender.clone()),
        encrypted_content: Some(outgoing[0].encrypted_content.clone()),
    };
    match alice.open_message(&sent_copy) {
        Ok(text) => println!("  [OK] Alice re-reads her sent message: \"{}\"", text),
        Err(e) => println!("  [FAILED] Alice cannot re-read: {}", e),
    }
    println!("  Alice sent it: {}", alice.is_own_message(&sent_copy));
    println!();

    println!("=== Example Complete ===");
}
