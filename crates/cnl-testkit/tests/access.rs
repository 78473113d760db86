//! Encrypted objects between a producer and granted or ungranted readers.

use std::rc::Rc;

use cnl::access::{ContentKey, ContentKeyDecryptor, ContentKeyEncryptor, KeyGrant, X25519StaticSecret};
use cnl::{NamespaceState, Object};
use cnl_testkit::TestFixture;

fn encrypted_fixture() -> anyhow::Result<(TestFixture, ContentKey)> {
    let fixture = TestFixture::new("/clinic/records")?;
    let key = ContentKey::generate();
    fixture
        .producer
        .set_encryptor(Rc::new(ContentKeyEncryptor::new(key.clone())));
    fixture
        .producer
        .get_child("patient-7")
        .serialize_object(Object::from("blood type O"))?;
    Ok((fixture, key))
}

#[test]
fn test_granted_reader_decrypts() -> anyhow::Result<()> {
    let (fixture, key) = encrypted_fixture()?;
    let reader = X25519StaticSecret::generate();
    let grant = KeyGrant::create(fixture.producer.name(), &key, &reader.public_key())?;

    let decryptor = ContentKeyDecryptor::new();
    decryptor.accept_grant(&grant, &reader)?;
    fixture.validate_consumer();
    fixture.consumer.set_decryptor(Rc::new(decryptor));

    let record = fixture.consumer.get_child("patient-7");
    record.object_needed(false)?;
    fixture.process();

    assert_eq!(record.state(), NamespaceState::ObjectReady);
    assert_eq!(record.blob_object().unwrap().as_ref(), b"blood type O");
    Ok(())
}

#[test]
fn test_reader_without_key_sees_decryption_error() -> anyhow::Result<()> {
    let (fixture, _key) = encrypted_fixture()?;
    fixture
        .consumer
        .set_decryptor(Rc::new(ContentKeyDecryptor::new()));

    let record = fixture.consumer.get_child("patient-7");
    record.object_needed(false)?;
    fixture.process();

    assert_eq!(record.state(), NamespaceState::DecryptionError);
    assert!(record.decryption_error().unwrap().contains("KeyNotFound"));
    assert!(record.object().is_none());
    Ok(())
}

#[test]
fn test_ciphertext_on_the_wire() -> anyhow::Result<()> {
    let (fixture, _key) = encrypted_fixture()?;
    let produced = fixture.producer.get_child("patient-7");
    let data = produced.data().unwrap();
    assert_ne!(data.content.as_ref(), b"blood type O");
    assert_eq!(produced.blob_object().unwrap().as_ref(), b"blood type O");
    Ok(())
}
