/*!

This is the long-form manual for `stated_preference` and `mmsurvey`.

## Scenario dataset

The dataset lists every alternative of every task, one per row. It can be a
CSV file (`csv`) or the first worksheet of an Excel file (`xlsx`, or a named
worksheet with `excelWorksheetName`).

```text
Task,Alternative,Time,Cost,Wait
1,e-rickshaw,12,20,5
1,public bike sharing system,15,10,3
1,walking,40,0,0
2,e-rickshaw,10,30,2
```

Header names are not significant, but there must be exactly five columns in
this order. Line breaks and repeated spaces in headers are tolerated.

- Rows whose `Task` is not a non-negative integer are skipped (separator or
  comment rows).
- `Alternative` is matched without regard to case or surrounding spaces.
  Any other value is an error.
- `Time`, `Cost` and `Wait` must be numbers.
- A task is only used if it has exactly three rows. Other tasks are dropped
  with a warning.

## Blocks

The valid tasks are sorted and split into 4 contiguous blocks whose sizes
differ by at most one, the first blocks taking the extra tasks. A session sees
the block selected by a hash of its identity, so passing the same
`--session-id` always shows the same tasks. With fewer than 4 valid tasks some
blocks are empty: such sessions go straight to the demographic forms.

## Outputs

Every completed session produces one record:

| key | content |
|-----|---------|
| `id` | a fresh UUID |
| `timestamp` | local time, ISO-8601 |
| `residence` ... `income` | general information form |
| `cars_owned` ... `last_mile_walking` | travel habits form |
| `Task_<id>` | chosen alternative with its attributes |

The record is written to three places, independently:

- `responses_<id>.json` in the output directory
- `responses.csv`, appended, with a header row (and a UTF-8 byte order mark)
  when the file is created. Sessions assigned to different blocks answer
  different tasks, so their `Task_<id>` columns differ from the header. The row
  is still appended: header columns the record lacks stay empty, and keys the
  header lacks go to unlabeled columns at the end of the row. The notice names
  each of those keys with its column number.
- the configured spreadsheet, if any. The header row is added when the sheet is
  empty.

A failing destination never prevents the others from being written, and never
prevents the session from completing.

The JSON files are the authoritative source for task identity: every answer is
stored under its own `Task_<id>` key, whatever the header of the CSV file.

## Configuration

All the keys are optional.

```text
{
  "outputSettings": {
    "surveyName": "Micromobility Choice Survey",
    "outputDirectory": "out",
    "cumulativeFileName": "responses.csv"
  },
  "dataSources": [ { "provider": "csv", "filePath": "survey_data.csv" } ],
  "spreadsheet": {
    "sheetName": "Micromobility Responses",
    "spreadsheetId": "1AbC...",
    "credentialsPath": "gcp_credentials.json"
  },
  "images": { "directory": "images", "fallback": "default.jpg" },
  "numBlocks": 4
}
```

Relative paths are resolved against the directory of the configuration file.
The credentials file is a JSON object with an `access_token` field, and
optionally an `endpoint` to use instead of the public spreadsheet API.

 */
