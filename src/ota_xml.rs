// Concrete protocol adapter for the OTA-XML message family (Booking.com
// style supply API): HTTPS with Basic auth, hand-built request documents,
// HTTP-status-gated responses. Inventory/property operations go to the
// channel's general endpoint; reservation operations go to a separate,
// more restricted endpoint, mirroring the PCI-scope split of real travel
// distribution APIs.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use quick_xml::de::from_str;
use serde::{Deserialize, Serialize};

use crate::adapter::{AdapterError, ProtocolAdapter, PullOutcome, SyncOutcome};
use crate::config::SyncConfig;
use crate::model::{BookingStatus, Channel, ChannelBooking, DateRange, InventoryRecord};

const OTA_XMLNS: &str = "http://www.opentravel.org/OTA/2003/05";
const OTA_VERSION: &str = "1.0";
const XML_HEADER: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>";

pub struct OtaXmlAdapter {
    client: reqwest::Client,
}

// Credential bundle fields the OTA-XML family needs. The bundle itself is
// opaque JSON on the channel; only this adapter interprets it.
struct OtaCredentials {
    username: String,
    password: String,
    reservation_endpoint: Option<String>,
}

impl OtaCredentials {
    fn from_channel(channel: &Channel) -> Result<Self, AdapterError> {
        let field = |name: &'static str| -> Result<String, AdapterError> {
            channel
                .credentials
                .get(name)
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string())
                .ok_or(AdapterError::MissingCredential(name))
        };
        Ok(Self {
            username: field("username")?,
            password: field("password")?,
            reservation_endpoint: channel
                .credentials
                .get("reservation_endpoint")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
        })
    }

    fn reservation_endpoint(&self, channel: &Channel) -> String {
        self.reservation_endpoint.clone().unwrap_or_else(|| {
            format!("{}/reservations", channel.endpoint.trim_end_matches('/'))
        })
    }
}

struct HttpReply {
    status: u16,
    body: String,
}

impl OtaXmlAdapter {
    pub fn new(config: &SyncConfig) -> Result<Self, AdapterError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AdapterError::Init(e.to_string()))?;
        Ok(Self { client })
    }

    // Transport-level exchange. Every failure mode comes back as `Err(text)`
    // so callers fold it into a failed outcome; nothing escapes as a panic
    // or an adapter error.
    async fn post_xml(
        &self,
        url: &str,
        creds: &OtaCredentials,
        body: String,
    ) -> Result<HttpReply, String> {
        let response = self
            .client
            .post(url)
            .basic_auth(&creds.username, Some(&creds.password))
            .header("Content-Type", "application/xml")
            .body(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    format!("request to {} timed out", url)
                } else {
                    format!("request to {} failed: {}", url, e)
                }
            })?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .unwrap_or_else(|e| format!("<unreadable response body: {}>", e));
        Ok(HttpReply { status, body })
    }
}

#[async_trait]
impl ProtocolAdapter for OtaXmlAdapter {
    async fn test_connection(&self, channel: &Channel) -> SyncOutcome {
        // total by contract: configuration problems are failed outcomes
        // naming the field, never hard errors
        if channel.property_id.is_empty() {
            return SyncOutcome::fail(
                "channel has no external property identifier (property_id)",
            );
        }
        let creds = match OtaCredentials::from_channel(channel) {
            Ok(creds) => creds,
            Err(e) => return SyncOutcome::fail(e.to_string()),
        };

        let request = build_property_info_request(&channel.property_id);
        tracing::debug!(channel_id = channel.id, "probing OTA endpoint");
        match self.post_xml(&channel.endpoint, &creds, request.clone()).await {
            Ok(reply) if reply.status == 200 => {
                let mut outcome = SyncOutcome::ok("connection ok");
                outcome.request_payload = Some(request);
                outcome.response_payload = Some(reply.body);
                outcome
            }
            Ok(reply) => {
                let mut outcome =
                    SyncOutcome::fail(format!("endpoint answered HTTP {}", reply.status));
                outcome.request_payload = Some(request);
                outcome.response_payload = Some(reply.body);
                outcome
            }
            Err(message) => {
                let mut outcome = SyncOutcome::fail(message);
                outcome.request_payload = Some(request);
                outcome
            }
        }
    }

    // Batched by date, not globally atomic: one OTA_HotelInvNotifRQ per
    // calendar date, issued sequentially. A rejected date does not stop the
    // remaining dates; the outcome carries per-date accounting.
    async fn push_inventory(
        &self,
        channel: &Channel,
        records: &[InventoryRecord],
    ) -> Result<SyncOutcome, AdapterError> {
        let creds = OtaCredentials::from_channel(channel)?;
        if channel.property_id.is_empty() {
            return Err(AdapterError::MissingPropertyId);
        }

        let mut by_date: BTreeMap<NaiveDate, Vec<&InventoryRecord>> = BTreeMap::new();
        for record in records {
            by_date.entry(record.date).or_default().push(record);
        }

        let mut successful: u32 = 0;
        let mut failed: u32 = 0;
        let mut failures: Vec<String> = Vec::new();
        let mut requests: Vec<String> = Vec::new();
        let mut responses: Vec<String> = Vec::new();

        for (date, batch) in &by_date {
            let request = build_inventory_notification(&channel.property_id, *date, batch);
            requests.push(request.clone());
            match self.post_xml(&channel.endpoint, &creds, request).await {
                Ok(reply) if reply.status == 200 => {
                    successful += batch.len() as u32;
                    responses.push(format!("{}: HTTP 200", date));
                }
                Ok(reply) => {
                    failed += batch.len() as u32;
                    failures.push(format!("{}: HTTP {}", date, reply.status));
                    responses.push(format!("{}: HTTP {} {}", date, reply.status, reply.body));
                }
                Err(message) => {
                    failed += batch.len() as u32;
                    failures.push(format!("{}: {}", date, message));
                    responses.push(format!("{}: {}", date, message));
                }
            }
        }

        let mut outcome = if failures.is_empty() {
            SyncOutcome::ok(format!(
                "pushed {} records across {} date batches",
                successful,
                by_date.len()
            ))
        } else {
            tracing::warn!(
                channel_id = channel.id,
                failed_batches = failures.len(),
                "inventory push partially rejected"
            );
            SyncOutcome::fail(failures.join("; "))
        };
        outcome.records_processed = records.len() as u32;
        outcome.records_successful = successful;
        outcome.records_failed = failed;
        outcome.request_payload = Some(requests.join("\n"));
        outcome.response_payload = Some(responses.join("\n"));
        Ok(outcome)
    }

    async fn pull_reservations(
        &self,
        channel: &Channel,
        range: DateRange,
    ) -> Result<PullOutcome, AdapterError> {
        let creds = OtaCredentials::from_channel(channel)?;
        if channel.property_id.is_empty() {
            return Err(AdapterError::MissingPropertyId);
        }

        let request = build_reservation_read_request(&channel.property_id, range);
        let endpoint = creds.reservation_endpoint(channel);
        let reply = match self.post_xml(&endpoint, &creds, request.clone()).await {
            Ok(reply) => reply,
            Err(message) => {
                let mut outcome = SyncOutcome::fail(message);
                outcome.request_payload = Some(request);
                return Ok(PullOutcome {
                    outcome,
                    bookings: Vec::new(),
                });
            }
        };

        if reply.status != 200 {
            let mut outcome =
                SyncOutcome::fail(format!("reservation endpoint answered HTTP {}", reply.status));
            outcome.request_payload = Some(request);
            outcome.response_payload = Some(reply.body);
            return Ok(PullOutcome {
                outcome,
                bookings: Vec::new(),
            });
        }

        match parse_reservations(&reply.body, channel) {
            Ok(bookings) => {
                let mut outcome =
                    SyncOutcome::ok(format!("retrieved {} reservations", bookings.len()));
                outcome.records_processed = bookings.len() as u32;
                outcome.records_successful = bookings.len() as u32;
                outcome.request_payload = Some(request);
                outcome.response_payload = Some(reply.body);
                Ok(PullOutcome { outcome, bookings })
            }
            Err(message) => {
                let mut outcome = SyncOutcome::fail(message);
                outcome.request_payload = Some(request);
                outcome.response_payload = Some(reply.body);
                Ok(PullOutcome {
                    outcome,
                    bookings: Vec::new(),
                })
            }
        }
    }

    async fn update_reservation_status(
        &self,
        channel: &Channel,
        reservation_id: &str,
        status: BookingStatus,
    ) -> Result<SyncOutcome, AdapterError> {
        let creds = OtaCredentials::from_channel(channel)?;
        if channel.property_id.is_empty() {
            return Err(AdapterError::MissingPropertyId);
        }

        let request =
            build_reservation_status_notification(&channel.property_id, reservation_id, &status);
        let endpoint = creds.reservation_endpoint(channel);
        match self.post_xml(&endpoint, &creds, request.clone()).await {
            Ok(reply) if reply.status == 200 => {
                let mut outcome = SyncOutcome::ok(format!(
                    "reservation {} marked {}",
                    reservation_id,
                    status.as_res_status()
                ));
                outcome.records_processed = 1;
                outcome.records_successful = 1;
                outcome.request_payload = Some(request);
                outcome.response_payload = Some(reply.body);
                Ok(outcome)
            }
            Ok(reply) => {
                let mut outcome =
                    SyncOutcome::fail(format!("endpoint answered HTTP {}", reply.status));
                outcome.records_processed = 1;
                outcome.records_failed = 1;
                outcome.request_payload = Some(request);
                outcome.response_payload = Some(reply.body);
                Ok(outcome)
            }
            Err(message) => {
                let mut outcome = SyncOutcome::fail(message);
                outcome.records_processed = 1;
                outcome.records_failed = 1;
                outcome.request_payload = Some(request);
                Ok(outcome)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Request documents
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename = "OTA_HotelInvNotifRQ")]
struct InvNotifRq {
    #[serde(rename = "@xmlns")]
    xmlns: &'static str,
    #[serde(rename = "@Version")]
    version: &'static str,
    #[serde(rename = "@TimeStamp")]
    time_stamp: String,
    #[serde(rename = "Inventories")]
    inventories: XmlInventories,
}

#[derive(Debug, Serialize)]
struct XmlInventories {
    #[serde(rename = "@HotelCode")]
    hotel_code: String,
    #[serde(rename = "Inventory")]
    items: Vec<XmlInventory>,
}

#[derive(Debug, Serialize)]
struct XmlInventory {
    #[serde(rename = "StatusApplicationControl")]
    control: XmlStatusApplicationControl,
    #[serde(rename = "InvCounts")]
    counts: XmlInvCounts,
    #[serde(rename = "RateAmount")]
    rate: XmlRateAmount,
}

#[derive(Debug, Serialize)]
struct XmlStatusApplicationControl {
    #[serde(rename = "@Start")]
    start: String,
    #[serde(rename = "@End")]
    end: String,
    #[serde(rename = "@InvTypeCode")]
    inv_type_code: String,
    #[serde(rename = "@RatePlanCode")]
    rate_plan_code: String,
}

#[derive(Debug, Serialize)]
struct XmlInvCounts {
    #[serde(rename = "InvCount")]
    counts: Vec<XmlInvCount>,
}

#[derive(Debug, Serialize)]
struct XmlInvCount {
    // CountType 2 = definite availability in the OTA code table
    #[serde(rename = "@CountType")]
    count_type: &'static str,
    #[serde(rename = "@Count")]
    count: String,
}

#[derive(Debug, Serialize)]
struct XmlRateAmount {
    #[serde(rename = "@AmountAfterTax")]
    amount_after_tax: String,
    #[serde(rename = "@CurrencyCode")]
    currency_code: String,
}

// One inventory-notification document for one calendar date: a line item
// per (room type, rate plan) pair with that date's availability and rate.
pub fn build_inventory_notification(
    hotel_code: &str,
    date: NaiveDate,
    records: &[&InventoryRecord],
) -> String {
    let day = date.format("%Y-%m-%d").to_string();
    let items = records
        .iter()
        .map(|record| XmlInventory {
            control: XmlStatusApplicationControl {
                start: day.clone(),
                end: day.clone(),
                inv_type_code: record.external_room_id.clone(),
                rate_plan_code: record.external_rate_plan_id.clone(),
            },
            counts: XmlInvCounts {
                counts: vec![XmlInvCount {
                    count_type: "2",
                    count: record.available_rooms.to_string(),
                }],
            },
            rate: XmlRateAmount {
                amount_after_tax: format!("{:.2}", record.rate),
                currency_code: record.currency.clone(),
            },
        })
        .collect();

    let document = InvNotifRq {
        xmlns: OTA_XMLNS,
        version: OTA_VERSION,
        time_stamp: Utc::now().to_rfc3339(),
        inventories: XmlInventories {
            hotel_code: hotel_code.to_string(),
            items,
        },
    };
    serialize_document(&document)
}

#[derive(Debug, Serialize)]
#[serde(rename = "OTA_HotelDescriptiveInfoRQ")]
struct DescriptiveInfoRq {
    #[serde(rename = "@xmlns")]
    xmlns: &'static str,
    #[serde(rename = "@Version")]
    version: &'static str,
    #[serde(rename = "HotelDescriptiveInfos")]
    infos: XmlDescriptiveInfos,
}

#[derive(Debug, Serialize)]
struct XmlDescriptiveInfos {
    #[serde(rename = "HotelDescriptiveInfo")]
    infos: Vec<XmlDescriptiveInfo>,
}

#[derive(Debug, Serialize)]
struct XmlDescriptiveInfo {
    #[serde(rename = "@HotelCode")]
    hotel_code: String,
}

pub fn build_property_info_request(hotel_code: &str) -> String {
    let document = DescriptiveInfoRq {
        xmlns: OTA_XMLNS,
        version: OTA_VERSION,
        infos: XmlDescriptiveInfos {
            infos: vec![XmlDescriptiveInfo {
                hotel_code: hotel_code.to_string(),
            }],
        },
    };
    serialize_document(&document)
}

#[derive(Debug, Serialize)]
#[serde(rename = "OTA_ReadRQ")]
struct ReadRq {
    #[serde(rename = "@xmlns")]
    xmlns: &'static str,
    #[serde(rename = "@Version")]
    version: &'static str,
    #[serde(rename = "ReadRequests")]
    read_requests: XmlReadRequests,
}

#[derive(Debug, Serialize)]
struct XmlReadRequests {
    #[serde(rename = "HotelReadRequest")]
    requests: Vec<XmlHotelReadRequest>,
}

#[derive(Debug, Serialize)]
struct XmlHotelReadRequest {
    #[serde(rename = "@HotelCode")]
    hotel_code: String,
    #[serde(rename = "SelectionCriteria")]
    criteria: XmlSelectionCriteria,
}

#[derive(Debug, Serialize)]
struct XmlSelectionCriteria {
    #[serde(rename = "@Start")]
    start: String,
    #[serde(rename = "@End")]
    end: String,
}

pub fn build_reservation_read_request(hotel_code: &str, range: DateRange) -> String {
    let document = ReadRq {
        xmlns: OTA_XMLNS,
        version: OTA_VERSION,
        read_requests: XmlReadRequests {
            requests: vec![XmlHotelReadRequest {
                hotel_code: hotel_code.to_string(),
                criteria: XmlSelectionCriteria {
                    start: range.from.format("%Y-%m-%d").to_string(),
                    end: range.to.format("%Y-%m-%d").to_string(),
                },
            }],
        },
    };
    serialize_document(&document)
}

#[derive(Debug, Serialize)]
#[serde(rename = "OTA_HotelResNotifRQ")]
struct ResNotifRq {
    #[serde(rename = "@xmlns")]
    xmlns: &'static str,
    #[serde(rename = "@Version")]
    version: &'static str,
    #[serde(rename = "HotelReservations")]
    reservations: XmlHotelReservationsRq,
}

#[derive(Debug, Serialize)]
struct XmlHotelReservationsRq {
    #[serde(rename = "@HotelCode")]
    hotel_code: String,
    #[serde(rename = "HotelReservation")]
    reservations: Vec<XmlHotelReservationRq>,
}

#[derive(Debug, Serialize)]
struct XmlHotelReservationRq {
    #[serde(rename = "@ResStatus")]
    res_status: String,
    #[serde(rename = "UniqueID")]
    unique_id: XmlUniqueIdRq,
}

#[derive(Debug, Serialize)]
struct XmlUniqueIdRq {
    // Type 14 = reservation in the OTA unique-id code table
    #[serde(rename = "@Type")]
    id_type: &'static str,
    #[serde(rename = "@ID")]
    id: String,
}

pub fn build_reservation_status_notification(
    hotel_code: &str,
    reservation_id: &str,
    status: &BookingStatus,
) -> String {
    let document = ResNotifRq {
        xmlns: OTA_XMLNS,
        version: OTA_VERSION,
        reservations: XmlHotelReservationsRq {
            hotel_code: hotel_code.to_string(),
            reservations: vec![XmlHotelReservationRq {
                res_status: status.as_res_status().to_string(),
                unique_id: XmlUniqueIdRq {
                    id_type: "14",
                    id: reservation_id.to_string(),
                },
            }],
        },
    };
    serialize_document(&document)
}

fn serialize_document<T: Serialize>(document: &T) -> String {
    // serialization of these fixed shapes cannot fail; fall back to an
    // empty document rather than panicking in a request path
    let body = quick_xml::se::to_string(document).unwrap_or_default();
    format!("{}{}", XML_HEADER, body)
}

// ---------------------------------------------------------------------------
// Reservation retrieval response
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OtaResRetrieveRs {
    #[serde(rename = "ReservationsList")]
    reservations_list: XmlReservationsList,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct XmlReservationsList {
    #[serde(rename = "HotelReservation")]
    reservations: Vec<XmlHotelReservation>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct XmlHotelReservation {
    #[serde(rename = "@CreateDateTime")]
    create_date_time: String,
    #[serde(rename = "@ResStatus")]
    res_status: String,
    #[serde(rename = "UniqueID")]
    unique_id: XmlUniqueId,
    #[serde(rename = "RoomStays")]
    room_stays: XmlRoomStays,
    #[serde(rename = "ResGuests")]
    res_guests: XmlResGuests,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct XmlUniqueId {
    #[serde(rename = "@ID")]
    id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct XmlRoomStays {
    #[serde(rename = "RoomStay")]
    stays: Vec<XmlRoomStay>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct XmlRoomStay {
    #[serde(rename = "RoomTypes")]
    room_types: XmlRoomTypes,
    #[serde(rename = "TimeSpan")]
    time_span: XmlTimeSpan,
    #[serde(rename = "Total")]
    total: XmlTotal,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct XmlRoomTypes {
    #[serde(rename = "RoomType")]
    room_types: Vec<XmlRoomType>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct XmlRoomType {
    #[serde(rename = "@RoomTypeCode")]
    code: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct XmlTimeSpan {
    #[serde(rename = "@Start")]
    start: String,
    #[serde(rename = "@End")]
    end: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct XmlTotal {
    #[serde(rename = "@AmountAfterTax")]
    amount_after_tax: String,
    #[serde(rename = "@CurrencyCode")]
    currency_code: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct XmlResGuests {
    #[serde(rename = "ResGuest")]
    guests: Vec<XmlResGuest>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct XmlResGuest {
    #[serde(rename = "Profiles")]
    profiles: XmlProfiles,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct XmlProfiles {
    #[serde(rename = "Profile")]
    profiles: Vec<XmlProfile>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct XmlProfile {
    #[serde(rename = "Customer")]
    customer: XmlCustomer,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct XmlCustomer {
    #[serde(rename = "PersonName")]
    person_name: XmlPersonName,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct XmlPersonName {
    #[serde(rename = "GivenName")]
    given_name: String,
    #[serde(rename = "Surname")]
    surname: String,
}

// Parses an OTA_ResRetrieveRS document into booking records for the given
// channel. Entries without a usable reservation id are dropped (and
// logged); monetary and date fields degrade to zero/None rather than
// failing the whole document.
pub fn parse_reservations(xml: &str, channel: &Channel) -> Result<Vec<ChannelBooking>, String> {
    let response: OtaResRetrieveRs =
        from_str(xml).map_err(|e| format!("failed to parse OTA_ResRetrieveRS: {}", e))?;

    let mut bookings = Vec::new();
    for reservation in response.reservations_list.reservations {
        if reservation.unique_id.id.is_empty() {
            tracing::warn!(
                channel_id = channel.id,
                "skipping reservation without a unique id"
            );
            continue;
        }

        let stay = reservation.room_stays.stays.first();
        let room_type_code = stay
            .and_then(|s| s.room_types.room_types.first())
            .map(|rt| rt.code.clone())
            .unwrap_or_default();
        let (check_in, check_out) = stay
            .map(|s| {
                (
                    parse_ota_date(&s.time_span.start),
                    parse_ota_date(&s.time_span.end),
                )
            })
            .unwrap_or((None, None));
        let total_amount = stay
            .map(|s| s.total.amount_after_tax.parse().unwrap_or(0.0))
            .unwrap_or(0.0);
        let currency = stay
            .map(|s| s.total.currency_code.clone())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(crate::model::default_currency);

        let guest_name = reservation
            .res_guests
            .guests
            .first()
            .and_then(|g| g.profiles.profiles.first())
            .map(|p| {
                format!(
                    "{} {}",
                    p.customer.person_name.given_name, p.customer.person_name.surname
                )
                .trim()
                .to_string()
            })
            .unwrap_or_default();

        let created_at = DateTime::parse_from_rfc3339(&reservation.create_date_time)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        bookings.push(ChannelBooking {
            id: 0,
            hotel_id: channel.hotel_id,
            channel_id: channel.id,
            external_booking_id: reservation.unique_id.id,
            guest_name,
            room_type_code,
            check_in,
            check_out,
            total_amount,
            currency,
            status: BookingStatus::from_res_status(&reservation.res_status),
            created_at,
        });
    }
    Ok(bookings)
}

fn parse_ota_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

// A small sample for inline testing
pub const SAMPLE_RES_RETRIEVE_XML: &str = r#"
<OTA_ResRetrieveRS xmlns="http://www.opentravel.org/OTA/2003/05" Version="1.0">
  <ReservationsList>
    <HotelReservation CreateDateTime="2025-06-10T09:30:00Z" ResStatus="Commit">
      <UniqueID Type="14" ID="BK-1001"/>
      <RoomStays>
        <RoomStay>
          <RoomTypes>
            <RoomType RoomTypeCode="DLX"/>
          </RoomTypes>
          <TimeSpan Start="2025-06-11" End="2025-06-12"/>
          <Total AmountAfterTax="184.50" CurrencyCode="USD"/>
        </RoomStay>
      </RoomStays>
      <ResGuests>
        <ResGuest>
          <Profiles>
            <Profile>
              <Customer>
                <PersonName>
                  <GivenName>Jane</GivenName>
                  <Surname>Doe</Surname>
                </PersonName>
              </Customer>
            </Profile>
          </Profiles>
        </ResGuest>
      </ResGuests>
    </HotelReservation>
    <HotelReservation CreateDateTime="2025-06-10T11:00:00Z" ResStatus="Cancel">
      <UniqueID Type="14" ID="BK-1002"/>
      <RoomStays>
        <RoomStay>
          <RoomTypes>
            <RoomType RoomTypeCode="SGL"/>
          </RoomTypes>
          <TimeSpan Start="2025-06-15" End="2025-06-16"/>
          <Total AmountAfterTax="92.00" CurrencyCode="USD"/>
        </RoomStay>
      </RoomStays>
    </HotelReservation>
  </ReservationsList>
</OTA_ResRetrieveRS>
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChannelSettings, ChannelStatus, RoomCategory};
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn ota_channel(credentials: serde_json::Value, property_id: &str) -> Channel {
        Channel {
            id: 1,
            hotel_id: 7,
            channel_type: "booking_com".to_string(),
            name: "Booking.com".to_string(),
            property_id: property_id.to_string(),
            endpoint: "http://127.0.0.1:9/xml".to_string(),
            credentials,
            status: ChannelStatus::Active,
            settings: ChannelSettings::default(),
            created_at: Utc::now(),
        }
    }

    fn record(day: NaiveDate, room: &str, plan: &str, available: u32, rate: f64) -> InventoryRecord {
        InventoryRecord {
            channel_id: 1,
            room_category: RoomCategory::Deluxe,
            date: day,
            total_rooms: available + 1,
            available_rooms: available,
            rate,
            currency: "USD".to_string(),
            external_room_id: room.to_string(),
            external_rate_plan_id: plan.to_string(),
        }
    }

    #[test]
    fn test_inventory_notification_document_shape() {
        let r1 = record(date(2025, 6, 1), "DLX", "RP1", 5, 123.456);
        let r2 = record(date(2025, 6, 1), "SGL", "RP2", 2, 80.0);
        let refs: Vec<&InventoryRecord> = vec![&r1, &r2];
        let xml = build_inventory_notification("PROP-1", date(2025, 6, 1), &refs);

        assert!(xml.starts_with(XML_HEADER));
        assert!(xml.contains("<OTA_HotelInvNotifRQ"));
        assert!(xml.contains("xmlns=\"http://www.opentravel.org/OTA/2003/05\""));
        assert!(xml.contains("<Inventories HotelCode=\"PROP-1\">"));
        assert!(xml.contains(
            "StatusApplicationControl Start=\"2025-06-01\" End=\"2025-06-01\" InvTypeCode=\"DLX\" RatePlanCode=\"RP1\""
        ));
        assert!(xml.contains("<InvCount CountType=\"2\" Count=\"5\"/>"));
        // rate rounded to two decimals on the wire
        assert!(xml.contains("AmountAfterTax=\"123.46\""));
        assert!(xml.contains("InvTypeCode=\"SGL\""));
    }

    #[test]
    fn test_property_info_request_shape() {
        let xml = build_property_info_request("PROP-9");
        assert!(xml.contains("<OTA_HotelDescriptiveInfoRQ"));
        assert!(xml.contains("HotelDescriptiveInfo HotelCode=\"PROP-9\""));
    }

    #[test]
    fn test_reservation_read_request_shape() {
        let range = DateRange::new(date(2025, 6, 1), date(2025, 6, 30)).unwrap();
        let xml = build_reservation_read_request("PROP-1", range);
        assert!(xml.contains("<OTA_ReadRQ"));
        assert!(xml.contains("HotelReadRequest HotelCode=\"PROP-1\""));
        assert!(xml.contains("SelectionCriteria Start=\"2025-06-01\" End=\"2025-06-30\""));
    }

    #[test]
    fn test_status_notification_shape() {
        let xml = build_reservation_status_notification(
            "PROP-1",
            "BK-1001",
            &BookingStatus::Cancelled,
        );
        assert!(xml.contains("<OTA_HotelResNotifRQ"));
        assert!(xml.contains("HotelReservations HotelCode=\"PROP-1\""));
        assert!(xml.contains("HotelReservation ResStatus=\"Cancel\""));
        assert!(xml.contains("UniqueID Type=\"14\" ID=\"BK-1001\""));
    }

    #[test]
    fn test_parse_sample_reservations() {
        let channel = ota_channel(json!({}), "PROP-1");
        let bookings = parse_reservations(SAMPLE_RES_RETRIEVE_XML, &channel).unwrap();
        assert_eq!(bookings.len(), 2);

        let first = &bookings[0];
        assert_eq!(first.external_booking_id, "BK-1001");
        assert_eq!(first.guest_name, "Jane Doe");
        assert_eq!(first.room_type_code, "DLX");
        assert_eq!(first.check_in, Some(date(2025, 6, 11)));
        assert_eq!(first.check_out, Some(date(2025, 6, 12)));
        assert_eq!(first.total_amount, 184.5);
        assert_eq!(first.status, BookingStatus::Confirmed);
        assert_eq!(first.hotel_id, 7);

        // guestless cancellation still parses
        let second = &bookings[1];
        assert_eq!(second.external_booking_id, "BK-1002");
        assert_eq!(second.status, BookingStatus::Cancelled);
        assert_eq!(second.guest_name, "");
    }

    #[test]
    fn test_parse_rejects_malformed_xml() {
        let channel = ota_channel(json!({}), "PROP-1");
        let result = parse_reservations("<OTA_ResRetrieveRS><broken", &channel);
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("OTA_ResRetrieveRS"));
    }

    #[test]
    fn test_parse_skips_entries_without_id() {
        let channel = ota_channel(json!({}), "PROP-1");
        let xml = r#"
        <OTA_ResRetrieveRS>
          <ReservationsList>
            <HotelReservation ResStatus="Commit">
              <UniqueID Type="14" ID=""/>
            </HotelReservation>
          </ReservationsList>
        </OTA_ResRetrieveRS>
        "#;
        let bookings = parse_reservations(xml, &channel).unwrap();
        assert!(bookings.is_empty());
    }

    #[tokio::test]
    async fn test_missing_credentials_are_hard_failures_for_push() {
        let adapter = OtaXmlAdapter::new(&SyncConfig::default()).unwrap();
        let channel = ota_channel(json!({"password": "secret"}), "PROP-1");
        let err = adapter.push_inventory(&channel, &[]).await.unwrap_err();
        assert!(matches!(err, AdapterError::MissingCredential("username")));
    }

    #[tokio::test]
    async fn test_connection_probe_names_missing_property_id() {
        let adapter = OtaXmlAdapter::new(&SyncConfig::default()).unwrap();
        let channel = ota_channel(json!({"username": "u", "password": "p"}), "");
        let outcome = adapter.test_connection(&channel).await;
        assert!(!outcome.success);
        assert!(outcome.message.contains("property_id"));
    }

    #[tokio::test]
    async fn test_connection_probe_names_missing_credential() {
        let adapter = OtaXmlAdapter::new(&SyncConfig::default()).unwrap();
        let channel = ota_channel(json!({"username": "u"}), "PROP-1");
        let outcome = adapter.test_connection(&channel).await;
        assert!(!outcome.success);
        assert!(outcome.message.contains("password"));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_a_failed_outcome_not_a_panic() {
        let adapter = OtaXmlAdapter::new(&SyncConfig::default()).unwrap();
        let channel = ota_channel(json!({"username": "u", "password": "p"}), "PROP-1");
        let r1 = record(date(2025, 6, 1), "DLX", "RP1", 5, 100.0);

        let outcome = adapter.push_inventory(&channel, &[r1]).await.unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.records_processed, 1);
        assert_eq!(outcome.records_failed, 1);
        assert!(outcome.request_payload.is_some());
    }

    #[test]
    fn test_reservation_endpoint_defaults_under_general_endpoint() {
        let channel = ota_channel(json!({"username": "u", "password": "p"}), "PROP-1");
        let creds = OtaCredentials::from_channel(&channel).unwrap();
        assert_eq!(
            creds.reservation_endpoint(&channel),
            "http://127.0.0.1:9/xml/reservations"
        );

        let channel = ota_channel(
            json!({
                "username": "u",
                "password": "p",
                "reservation_endpoint": "https://secure.example.invalid/res"
            }),
            "PROP-1",
        );
        let creds = OtaCredentials::from_channel(&channel).unwrap();
        assert_eq!(
            creds.reservation_endpoint(&channel),
            "https://secure.example.invalid/res"
        );
    }
}
